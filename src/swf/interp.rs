//! Stack machine evaluating methods of a parsed ABC block

use super::abc::{AbcFile, MethodBody, Multiname, Reader};
use super::container::extract_abc;
use super::value::{ClassId, Value};
use super::{Result, SwfError};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Host replacement for a method, keyed by `(class name, method name)`
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Value>;

const MAX_CALL_DEPTH: usize = 200;

/// Classes the runtime provides when no user scope defines the name
const BUILTIN_CLASSES: [&str; 4] = ["String", "ByteArray", "Timer", "TimerEvent"];

struct ClassInfo {
    name: String,
    methods: HashMap<String, usize>,
    constants: HashMap<String, Value>,
    statics: HashMap<String, Value>,
    cinit: Option<usize>,
}

#[derive(Clone)]
enum Callable {
    Native(NativeFn),
    /// Calling a class name yields a bare instance
    Construct(ClassId),
    Body(usize),
}

pub struct SwfInterpreter {
    strings: Vec<String>,
    multinames: Vec<Multiname>,
    classes: Vec<ClassInfo>,
    user_classes: usize,
    by_name: HashMap<String, ClassId>,
    bodies: Vec<MethodBody>,
    body_by_method: HashMap<usize, usize>,
    patches: HashMap<(String, String), NativeFn>,
    variables: RefCell<Vec<HashMap<String, Value>>>,
    resolved: RefCell<HashMap<(ClassId, String), Callable>>,
    initialized: RefCell<HashSet<ClassId>>,
}

impl fmt::Debug for SwfInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwfInterpreter")
            .field("classes", &self.class_names())
            .field("bodies", &self.bodies.len())
            .finish()
    }
}

/// A method bound to its class, callable any number of times
pub struct Function<'a> {
    interp: &'a SwfInterpreter,
    class: ClassId,
    name: String,
}

impl Function<'_> {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.interp.invoke(self.class, &self.name, args.to_vec(), 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SwfInterpreter {
    /// Load a compressed SWF file
    pub fn new(file: &[u8]) -> Result<Self> {
        Self::with_patches(file, HashMap::new())
    }

    /// Load a compressed SWF file, replacing the given methods with host code
    pub fn with_patches(file: &[u8], patches: HashMap<(String, String), NativeFn>) -> Result<Self> {
        let abc = AbcFile::parse(&extract_abc(file)?)?;
        Ok(Self::from_abc(abc, patches))
    }

    pub fn from_abc(abc: AbcFile, patches: HashMap<(String, String), NativeFn>) -> Self {
        let user_classes = abc.classes.len();
        let mut classes: Vec<ClassInfo> = abc
            .classes
            .into_iter()
            .map(|c| ClassInfo {
                name: c.name,
                methods: c.methods,
                constants: c.constants,
                statics: HashMap::new(),
                cinit: c.cinit,
            })
            .collect();
        for name in BUILTIN_CLASSES {
            let mut statics = HashMap::new();
            if name == "TimerEvent" {
                statics.insert("TIMER".to_string(), Value::str("timer"));
            }
            classes.push(ClassInfo {
                name: name.to_string(),
                methods: HashMap::new(),
                constants: HashMap::new(),
                statics,
                cinit: None,
            });
        }

        let mut by_name = HashMap::new();
        for (id, class) in classes.iter().enumerate().take(user_classes) {
            by_name.insert(class.name.clone(), id);
        }
        let body_by_method = abc
            .bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (b.method, i))
            .collect();

        let mut all_patches: HashMap<(String, String), NativeFn> = HashMap::new();
        all_patches.insert(
            ("Timer".to_string(), "addEventListener".to_string()),
            Rc::new(|_: &[Value]| Value::Undefined),
        );
        all_patches.extend(patches);

        let class_count = classes.len();
        Self {
            strings: abc.strings,
            multinames: abc.multinames,
            classes,
            user_classes,
            by_name,
            bodies: abc.bodies,
            body_by_method,
            patches: all_patches,
            variables: RefCell::new(vec![HashMap::new(); class_count]),
            resolved: RefCell::new(HashMap::new()),
            initialized: RefCell::new(HashSet::new()),
        }
    }

    /// Names of the classes defined by the file
    pub fn class_names(&self) -> Vec<&str> {
        self.classes[..self.user_classes]
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Look up a class and run its static initializer on first use
    pub fn extract_class(&self, name: &str) -> Result<ClassId> {
        let id = *self
            .by_name
            .get(name)
            .ok_or_else(|| SwfError::ClassNotFound(name.to_string()))?;
        self.ensure_initialized(id)?;
        Ok(id)
    }

    pub fn extract_function(&self, class: &str, name: &str) -> Result<Function<'_>> {
        let id = self.extract_class(class)?;
        self.resolve(id, name)?;
        Ok(Function {
            interp: self,
            class: id,
            name: name.to_string(),
        })
    }

    /// Current value of a class variable
    pub fn variable(&self, class: ClassId, name: &str) -> Option<Value> {
        self.variables.borrow().get(class)?.get(name).cloned()
    }

    fn ensure_initialized(&self, id: ClassId) -> Result<()> {
        if self.initialized.borrow().contains(&id) {
            return Ok(());
        }
        if let Some(cinit) = self.classes[id].cinit {
            let body = *self.body_by_method.get(&cinit).ok_or_else(|| SwfError::FunctionNotFound {
                class: self.classes[id].name.clone(),
                name: "$cinit".to_string(),
            })?;
            debug!(class = %self.classes[id].name, "running static initializer");
            self.execute(id, body, Vec::new(), 1)?;
        }
        // only a completed initializer counts; a failed one runs again next time
        self.initialized.borrow_mut().insert(id);
        Ok(())
    }

    fn resolve(&self, class: ClassId, name: &str) -> Result<Callable> {
        let info = &self.classes[class];
        if let Some(f) = self.patches.get(&(info.name.clone(), name.to_string())) {
            return Ok(Callable::Native(f.clone()));
        }
        let key = (class, name.to_string());
        if let Some(found) = self.resolved.borrow().get(&key) {
            return Ok(found.clone());
        }
        let callable = if let Some(&target) = self.by_name.get(name) {
            Callable::Construct(target)
        } else {
            match info.methods.get(name).and_then(|m| self.body_by_method.get(m)) {
                Some(&body) => Callable::Body(body),
                None => {
                    return Err(SwfError::FunctionNotFound {
                        class: info.name.clone(),
                        name: name.to_string(),
                    })
                }
            }
        };
        self.resolved.borrow_mut().insert(key, callable.clone());
        Ok(callable)
    }

    fn invoke(&self, class: ClassId, name: &str, args: Vec<Value>, depth: usize) -> Result<Value> {
        match self.resolve(class, name)? {
            Callable::Native(f) => Ok(f(&args)),
            Callable::Construct(target) => Ok(Value::Object(target)),
            Callable::Body(body) => self.execute(class, body, args, depth + 1),
        }
    }

    fn execute(&self, class: ClassId, body: usize, args: Vec<Value>, depth: usize) -> Result<Value> {
        if depth > MAX_CALL_DEPTH {
            return Err(SwfError::Unsupported(format!(
                "call depth limit of {} exceeded",
                MAX_CALL_DEPTH
            )));
        }
        let method = &self.bodies[body];
        let mut registers = Vec::with_capacity(1 + args.len() + method.local_count);
        registers.push(Value::Scope(class));
        registers.extend(args);
        registers.extend(std::iter::repeat(Value::Null).take(method.local_count));
        Frame {
            interp: self,
            class,
            code: Reader::new(&method.code),
            registers,
            stack: Vec::new(),
            scopes: vec![Value::Globals, Value::Constants(class), Value::Scope(class)],
            depth,
            at: 0,
        }
        .run()
    }

    fn builtin(&self, name: &str) -> Option<ClassId> {
        (self.user_classes..self.classes.len()).find(|id| self.classes[*id].name == name)
    }

    fn scope_get(&self, scope: &Value, name: &str) -> Option<Value> {
        match scope {
            Value::Globals => self.by_name.get(name).map(|id| Value::Class(*id)),
            Value::Constants(c) => self.classes[*c].constants.get(name).cloned(),
            Value::Scope(c) => self.variable(*c, name),
            _ => None,
        }
    }

    fn scope_has(&self, scope: &Value, name: &str) -> bool {
        match scope {
            Value::Globals => self.by_name.contains_key(name),
            Value::Constants(c) => self.classes[*c].constants.contains_key(name),
            Value::Scope(c) => self
                .variables
                .borrow()
                .get(*c)
                .map_or(false, |vars| vars.contains_key(name)),
            _ => false,
        }
    }
}

struct Frame<'a> {
    interp: &'a SwfInterpreter,
    class: ClassId,
    code: Reader<'a>,
    registers: Vec<Value>,
    stack: Vec<Value>,
    scopes: Vec<Value>,
    depth: usize,
    /// Offset of the opcode being executed
    at: usize,
}

impl<'a> Frame<'a> {
    fn structural(&self, message: impl Into<String>) -> SwfError {
        SwfError::structural(self.at, message)
    }

    fn pop(&mut self) -> Result<Value> {
        match self.stack.pop() {
            Some(v) => Ok(v),
            None => Err(self.structural("operand stack underflow")),
        }
    }

    fn pop_int(&mut self, what: &str) -> Result<i64> {
        match self.pop()? {
            Value::Int(i) => Ok(i),
            other => Err(SwfError::Type(format!("{} expects an integer, got {}", what, other.type_name()))),
        }
    }

    /// Pop `count` arguments, returned in call order
    fn pop_args(&mut self, count: usize) -> Result<Vec<Value>> {
        if self.stack.len() < count {
            return Err(self.structural(format!("operand stack underflow popping {} arguments", count)));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn register(&self, idx: usize) -> Result<Value> {
        self.registers
            .get(idx)
            .cloned()
            .ok_or_else(|| self.structural(format!("register {} out of range", idx)))
    }

    fn set_register(&mut self, idx: usize, value: Value) -> Result<()> {
        match self.registers.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.structural(format!("register {} out of range", idx))),
        }
    }

    fn multiname(&mut self) -> Result<Multiname> {
        let idx = self.code.u30()?;
        self.interp
            .multinames
            .get(idx)
            .cloned()
            .ok_or_else(|| self.structural(format!("multiname index {} out of range", idx)))
    }

    fn name_operand(&mut self, opcode: u8) -> Result<String> {
        match self.multiname()? {
            Multiname::Name(name) => Ok(name),
            Multiname::Unresolved(kind) => Err(SwfError::NotImplemented(format!(
                "Runtime multiname {:#x} for opcode {}",
                kind, opcode
            ))),
        }
    }

    fn branch(&mut self, taken: bool) -> Result<()> {
        let offset = self.code.s24()?;
        if taken {
            self.code.jump(i64::from(offset))?;
        }
        Ok(())
    }

    fn find_scope(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find(|s| self.interp.scope_has(s, name))
            .cloned()
    }

    fn run(mut self) -> Result<Value> {
        loop {
            self.at = self.code.position();
            let opcode = match self.code.u8() {
                Ok(op) => op,
                Err(_) => return Err(self.structural("ran past the end of the method body")),
            };
            match opcode {
                // label
                9 => {}
                16 => self.branch(true)?,
                17 => {
                    let v = self.pop()?;
                    self.branch(v.truthy())?;
                }
                18 => {
                    let v = self.pop()?;
                    self.branch(!v.truthy())?;
                }
                19 | 20 | 21 => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let taken = match opcode {
                        19 => a.loose_eq(&b),
                        20 => !a.loose_eq(&b),
                        _ => a.compare(&b)? == Some(std::cmp::Ordering::Less),
                    };
                    self.branch(taken)?;
                }
                32 => self.stack.push(Value::Null),
                33 => self.stack.push(Value::Undefined),
                36 => {
                    let v = self.code.u8()?;
                    self.stack.push(Value::Int(i64::from(v)));
                }
                37 => {
                    let v = self.code.u30()?;
                    self.stack.push(Value::Int(v as i64));
                }
                38 => self.stack.push(Value::Bool(true)),
                39 => self.stack.push(Value::Bool(false)),
                40 => self.stack.push(Value::Number(f64::NAN)),
                42 => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| self.structural("dup on an empty stack"))?;
                    self.stack.push(top);
                }
                44 => {
                    let idx = self.code.u30()?;
                    let s = self
                        .interp
                        .strings
                        .get(idx)
                        .cloned()
                        .ok_or_else(|| self.structural(format!("string index {} out of range", idx)))?;
                    self.stack.push(Value::Str(s));
                }
                48 => {
                    let scope = self.pop()?;
                    self.scopes.push(scope);
                }
                66 => {
                    let argc = self.code.u30()?;
                    self.pop_args(argc)?;
                    match self.pop()? {
                        Value::Class(c) | Value::Object(c) | Value::Scope(c) => {
                            self.stack.push(Value::Object(c))
                        }
                        other => {
                            return Err(SwfError::Type(format!("cannot construct {}", other.type_name())))
                        }
                    }
                }
                70 => {
                    let name = self.name_operand(opcode)?;
                    let argc = self.code.u30()?;
                    let args = self.pop_args(argc)?;
                    let obj = self.pop()?;
                    let res = self.call_property(obj, &name, args)?;
                    self.stack.push(res);
                }
                71 => return Ok(Value::Undefined),
                72 => return self.pop(),
                73 => {
                    // constructsuper: base constructors have no observable effect
                    let argc = self.code.u30()?;
                    self.pop_args(argc)?;
                    self.pop()?;
                }
                74 => {
                    self.multiname()?;
                    let argc = self.code.u30()?;
                    self.pop_args(argc)?;
                    match self.pop()? {
                        Value::Class(c) => self.stack.push(Value::Object(c)),
                        other => {
                            return Err(SwfError::Type(format!(
                                "constructproperty on {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                79 => {
                    let name = self.name_operand(opcode)?;
                    let argc = self.code.u30()?;
                    let args = self.pop_args(argc)?;
                    let obj = self.pop()?;
                    self.call_property_void(obj, &name, args)?;
                }
                86 => {
                    let argc = self.code.u30()?;
                    let items = self.pop_args(argc)?;
                    self.stack.push(Value::array(items));
                }
                93 => {
                    let name = self.name_operand(opcode)?;
                    let scope = self.find_scope(&name).unwrap_or(Value::Globals);
                    let value = match self.interp.scope_get(&scope, &name) {
                        Some(v) => v,
                        None => match self.interp.builtin(&name) {
                            Some(id) => Value::Class(id),
                            None => return Err(SwfError::Type(format!("Cannot find property {}", name))),
                        },
                    };
                    self.stack.push(value);
                }
                94 => {
                    let name = self.name_operand(opcode)?;
                    let scope = self.find_scope(&name).unwrap_or(Value::Scope(self.class));
                    self.stack.push(scope);
                }
                96 => {
                    let name = self.name_operand(opcode)?;
                    let scope = self.find_scope(&name).unwrap_or(Value::Scope(self.class));
                    let value = match self.interp.scope_get(&scope, &name) {
                        Some(v) => v,
                        None => match self.interp.builtin(&name) {
                            Some(id) => Value::Class(id),
                            None => {
                                debug!(name = %name, "getlex on an uninitialized name");
                                Value::Undefined
                            }
                        },
                    };
                    self.stack.push(value);
                }
                97 | 104 => {
                    let value = self.pop()?;
                    let key = match self.multiname()? {
                        Multiname::Name(name) => Value::Str(name),
                        Multiname::Unresolved(_) => self.pop()?,
                    };
                    let obj = self.pop()?;
                    self.set_property(obj, key, value)?;
                }
                98 => {
                    let idx = self.code.u30()?;
                    let v = self.register(idx)?;
                    self.stack.push(v);
                }
                99 => {
                    let idx = self.code.u30()?;
                    let v = self.pop()?;
                    self.set_register(idx, v)?;
                }
                102 => {
                    let res = match self.multiname()? {
                        Multiname::Name(name) => {
                            let obj = self.pop()?;
                            self.get_member(obj, &name)?
                        }
                        Multiname::Unresolved(_) => {
                            let idx = self.pop_int("indexed getproperty")?;
                            let obj = self.pop()?;
                            index_array(&obj, idx)?
                        }
                    };
                    self.stack.push(res);
                }
                115 => {
                    let v = self.pop()?;
                    self.stack.push(Value::Int(v.to_int()?));
                }
                128 => {
                    self.code.u30()?;
                }
                // coerce_a: any value is acceptable
                130 => {}
                133 => match self.stack.last() {
                    Some(Value::Null) | Some(Value::Str(_)) => {}
                    Some(other) => {
                        return Err(SwfError::Type(format!("coerce_s on {}", other.type_name())))
                    }
                    None => return Err(self.structural("coerce_s on an empty stack")),
                },
                147 => {
                    let v = self.pop_int("decrement")?;
                    self.stack.push(Value::Int(v).subtract(&Value::Int(1))?);
                }
                149 => {
                    let v = self.pop()?;
                    let name = match v {
                        Value::Undefined => "undefined",
                        Value::Str(_) => "String",
                        Value::Int(_) | Value::Number(_) => "Number",
                        Value::Bool(_) => "Boolean",
                        other => {
                            return Err(SwfError::Type(format!("typeof {} is not supported", other.type_name())))
                        }
                    };
                    self.stack.push(Value::str(name));
                }
                160 | 161 | 162 | 164 | 168 | 171 | 175 => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let res = match opcode {
                        160 => a.add(&b)?,
                        161 => a.subtract(&b)?,
                        162 => a.multiply(&b)?,
                        164 => a.modulo(&b)?,
                        168 => a.bitand(&b)?,
                        171 => Value::Bool(a.loose_eq(&b)),
                        _ => Value::Bool(matches!(
                            a.compare(&b)?,
                            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
                        )),
                    };
                    self.stack.push(res);
                }
                192 => {
                    let v = self.pop_int("increment_i")?;
                    self.stack.push(Value::Int(v).add(&Value::Int(1))?);
                }
                208..=211 => {
                    let v = self.register(usize::from(opcode - 208))?;
                    self.stack.push(v);
                }
                212..=215 => {
                    let v = self.pop()?;
                    self.set_register(usize::from(opcode - 212), v)?;
                }
                other => {
                    return Err(SwfError::NotImplemented(format!(
                        "Opcode {} at offset {}",
                        other, self.at
                    )))
                }
            }
        }
    }

    fn call_property(&mut self, obj: Value, name: &str, args: Vec<Value>) -> Result<Value> {
        let interp = self.interp;
        match obj {
            Value::Class(c) if interp.classes[c].name == "String" && c >= interp.user_classes => {
                if name != "String" {
                    return Err(SwfError::NotImplemented(format!("Function String.{}", name)));
                }
                match args.as_slice() {
                    [v @ (Value::Int(_) | Value::Str(_) | Value::Undefined)] => Ok(Value::str(v.to_string())),
                    _ => Err(SwfError::Type("String() takes one int, string or undefined".to_string())),
                }
            }
            Value::Class(c) | Value::Object(c) => interp.invoke(c, name, args, self.depth),
            Value::Scope(c) => {
                if interp.classes[c].methods.contains_key(name) {
                    interp.invoke(c, name, args, self.depth)
                } else {
                    interp
                        .variable(c, name)
                        .ok_or_else(|| SwfError::Type(format!("{} is not defined in the class scope", name)))
                }
            }
            Value::Str(s) => match (name, args.as_slice()) {
                ("split", [Value::Str(sep)]) => {
                    let parts: Vec<Value> = if sep.is_empty() {
                        s.chars().map(|c| Value::Str(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::str).collect()
                    };
                    Ok(Value::array(parts))
                }
                ("charCodeAt", [] | [Value::Int(_)]) => {
                    let idx = args.first().and_then(Value::as_int).unwrap_or(0);
                    // negative indices count from the end
                    let pos = if idx < 0 { s.chars().count() as i64 + idx } else { idx };
                    usize::try_from(pos)
                        .ok()
                        .and_then(|i| s.chars().nth(i))
                        .map(|c| Value::Int(i64::from(u32::from(c))))
                        .ok_or_else(|| SwfError::Type(format!("charCodeAt index {} out of range", idx)))
                }
                _ => Err(SwfError::NotImplemented(format!("Property {} on String", name))),
            },
            Value::Array(items) => match (name, args.as_slice()) {
                ("slice", [Value::Int(start)]) => {
                    let items = items.borrow();
                    let len = items.len() as i64;
                    let start = if *start < 0 { (len + start).max(0) } else { (*start).min(len) };
                    Ok(Value::array(items[start as usize..].to_vec()))
                }
                ("join", [Value::Str(sep)]) => {
                    let items = items.borrow();
                    let parts = items
                        .iter()
                        .map(|v| {
                            v.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| SwfError::Type(format!("join over a {}", v.type_name())))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Value::Str(parts.join(sep.as_str())))
                }
                _ => Err(SwfError::NotImplemented(format!("Property {} on Array", name))),
            },
            other => Err(SwfError::NotImplemented(format!(
                "Property {} on {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn call_property_void(&mut self, obj: Value, name: &str, args: Vec<Value>) -> Result<()> {
        let interp = self.interp;
        let res = match obj {
            Value::Object(c) => interp.invoke(c, name, args, self.depth)?,
            Value::Scope(c) => {
                if !interp.classes[c].methods.contains_key(name) {
                    return Err(SwfError::FunctionNotFound {
                        class: interp.classes[c].name.clone(),
                        name: name.to_string(),
                    });
                }
                interp.invoke(c, name, args, self.depth)?
            }
            Value::Array(items) if name == "reverse" => {
                items.borrow_mut().reverse();
                Value::Undefined
            }
            other => {
                return Err(SwfError::NotImplemented(format!(
                    "Void property {} on {}",
                    name,
                    other.type_name()
                )))
            }
        };
        match res {
            Value::Undefined => Ok(()),
            other => Err(SwfError::Type(format!("void call to {} returned {}", name, other))),
        }
    }

    fn get_member(&self, obj: Value, name: &str) -> Result<Value> {
        let interp = self.interp;
        match (&obj, name) {
            (Value::Str(s), "length") => Ok(Value::Int(s.chars().count() as i64)),
            (Value::Array(items), "length") => Ok(Value::Int(items.borrow().len() as i64)),
            (_, "length") => Err(SwfError::Type(format!("length of {}", obj.type_name()))),
            (Value::Class(c), _) => interp.classes[*c]
                .statics
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    SwfError::Type(format!("{} has no static property {}", interp.classes[*c].name, name))
                }),
            (Value::Scope(_) | Value::Constants(_) | Value::Globals, _) => {
                Ok(interp.scope_get(&obj, name).unwrap_or(Value::Undefined))
            }
            _ => Err(SwfError::Type(format!(
                "Accessing member {} on {}",
                name,
                obj.type_name()
            ))),
        }
    }

    fn set_property(&self, obj: Value, key: Value, value: Value) -> Result<()> {
        match (&obj, &key) {
            (Value::Scope(c), _) => {
                let mut vars = self.interp.variables.borrow_mut();
                if let Some(vars) = vars.get_mut(*c) {
                    vars.insert(key.to_string(), value);
                }
                Ok(())
            }
            (Value::Array(items), Value::Int(idx)) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match usize::try_from(*idx).ok().filter(|i| *i < len) {
                    Some(i) => {
                        items[i] = value;
                        Ok(())
                    }
                    None => Err(SwfError::Type(format!("array index {} out of range ({})", idx, len))),
                }
            }
            _ => Err(SwfError::Type(format!(
                "cannot set property {} on {}",
                key,
                obj.type_name()
            ))),
        }
    }
}

fn index_array(obj: &Value, idx: i64) -> Result<Value> {
    match obj {
        Value::Array(items) => {
            let items = items.borrow();
            usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| SwfError::Type(format!("array index {} out of range ({})", idx, items.len())))
        }
        other => Err(SwfError::Type(format!("indexing into {}", other.type_name()))),
    }
}
