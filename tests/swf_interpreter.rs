//! Running methods out of a complete compressed SWF file

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rustgrab::swf::{NativeFn, SwfError, SwfInterpreter, Value};
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

const NAMES: [&str; 9] = [
    "Scrambler", "flip", "split", "reverse", "join", "K", "seed", "seeded", "secret",
];

fn mn(name: &str) -> u8 {
    NAMES.iter().position(|n| *n == name).map(|i| i as u8 + 1).unwrap()
}

fn u30(out: &mut Vec<u8>, mut v: usize) {
    loop {
        let b = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            break;
        }
        out.push(b | 0x80);
    }
}

/// Class `Scrambler`: `flip(s)` reverses a string, `seeded(n)` returns
/// `seed * n + K` where the static initializer sets `seed = 3` and `K = 2`
fn scrambler_abc() -> Vec<u8> {
    let mut b = vec![16, 0, 46, 0];
    // ints: [0, 2]
    u30(&mut b, 2);
    u30(&mut b, 2);
    // uints, doubles
    u30(&mut b, 0);
    u30(&mut b, 0);
    u30(&mut b, NAMES.len() + 1);
    for name in NAMES {
        u30(&mut b, name.len());
        b.extend_from_slice(name.as_bytes());
    }
    // one package namespace, no namespace sets
    u30(&mut b, 2);
    b.push(0x16);
    u30(&mut b, 0);
    u30(&mut b, 0);
    // a QName per string
    u30(&mut b, NAMES.len() + 1);
    for idx in 1..=NAMES.len() {
        u30(&mut b, 0x07);
        u30(&mut b, 1);
        u30(&mut b, idx);
    }
    // methods: flip(s), seeded(n), cinit(), secret()
    u30(&mut b, 4);
    for params in [1, 1, 0, 0] {
        u30(&mut b, params);
        u30(&mut b, 0);
        for _ in 0..params {
            u30(&mut b, 0);
        }
        u30(&mut b, 0);
        b.push(0);
    }
    // metadata
    u30(&mut b, 0);
    // instance: name, super, flags, interfaces, iinit, no traits
    u30(&mut b, 1);
    u30(&mut b, usize::from(mn("Scrambler")));
    u30(&mut b, 0);
    b.push(0);
    u30(&mut b, 0);
    u30(&mut b, 2);
    u30(&mut b, 0);
    // class: cinit = method 2, traits K, flip, seeded, secret
    u30(&mut b, 2);
    u30(&mut b, 4);
    u30(&mut b, usize::from(mn("K")));
    b.push(0x06);
    u30(&mut b, 0);
    u30(&mut b, 0);
    u30(&mut b, 1);
    b.push(0x03);
    for (name, method) in [("flip", 0), ("seeded", 1), ("secret", 3)] {
        u30(&mut b, usize::from(mn(name)));
        b.push(0x01);
        u30(&mut b, 0);
        u30(&mut b, method);
    }
    // scripts
    u30(&mut b, 0);

    let flip = vec![
        209, 44, 0, 70, mn("split"), 1, 214, // a = s.split("")
        210, 79, mn("reverse"), 0, // a.reverse()
        210, 44, 0, 70, mn("join"), 1, 72, // return a.join("")
    ];
    let seeded = vec![96, mn("seed"), 209, 162, 96, mn("K"), 160, 72];
    let cinit = vec![208, 36, 3, 97, mn("seed"), 71];
    let secret = vec![0xfe];
    let bodies = [(0, 3, flip), (1, 2, seeded), (2, 1, cinit), (3, 1, secret)];
    u30(&mut b, bodies.len());
    for (method, locals, code) in bodies {
        u30(&mut b, method);
        u30(&mut b, 4);
        u30(&mut b, locals);
        u30(&mut b, 0);
        u30(&mut b, 1);
        u30(&mut b, code.len());
        b.extend_from_slice(&code);
        u30(&mut b, 0);
        u30(&mut b, 0);
    }
    b
}

fn swf_file(abc: &[u8]) -> Vec<u8> {
    // a zero-width frame rectangle, frame rate and frame count
    let mut body = vec![0, 0, 24, 1, 0];
    // SetBackgroundColor
    body.extend_from_slice(&((9u16 << 6) | 3).to_le_bytes());
    body.extend_from_slice(&[0xff, 0xff, 0xff]);
    // DoABC with the long length form
    let mut tag = vec![1, 0, 0, 0];
    tag.extend_from_slice(b"frame1\0");
    tag.extend_from_slice(abc);
    body.extend_from_slice(&((82u16 << 6) | 0x3f).to_le_bytes());
    body.extend_from_slice(&(tag.len() as u32).to_le_bytes());
    body.extend_from_slice(&tag);
    // End
    body.extend_from_slice(&[0, 0]);

    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&body).unwrap();
    let mut file = b"CWS\x0a".to_vec();
    file.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
    file.extend(enc.finish().unwrap());
    file
}

#[test]
fn test_runs_methods_from_swf() {
    let interp = SwfInterpreter::new(&swf_file(&scrambler_abc())).unwrap();
    assert_eq!(interp.class_names(), vec!["Scrambler"]);

    let flip = interp.extract_function("Scrambler", "flip").unwrap();
    assert_eq!(flip.name(), "flip");
    assert_eq!(flip.call(&[Value::str("signature")]).unwrap(), Value::str("erutangis"));
    assert_eq!(flip.call(&[Value::str("")]).unwrap(), Value::str(""));

    let seeded = interp.extract_function("Scrambler", "seeded").unwrap();
    assert_eq!(seeded.call(&[Value::Int(4)]).unwrap(), Value::Int(14));
    assert_eq!(seeded.call(&[Value::Int(-1)]).unwrap(), Value::Int(-1));

    let class = interp.extract_class("Scrambler").unwrap();
    assert_eq!(interp.variable(class, "seed"), Some(Value::Int(3)));
}

#[test]
fn test_patched_method_replaces_bytecode() {
    let mut patches: HashMap<(String, String), NativeFn> = HashMap::new();
    patches.insert(
        ("Scrambler".to_string(), "secret".to_string()),
        Rc::new(|args: &[Value]| Value::Int(args.len() as i64 + 100)),
    );
    let interp = SwfInterpreter::with_patches(&swf_file(&scrambler_abc()), patches).unwrap();
    let secret = interp.extract_function("Scrambler", "secret").unwrap();
    assert_eq!(secret.call(&[Value::Null]).unwrap(), Value::Int(101));
}

#[test]
fn test_unknown_opcode_fails_loudly() {
    let interp = SwfInterpreter::new(&swf_file(&scrambler_abc())).unwrap();
    let err = interp
        .extract_function("Scrambler", "secret")
        .unwrap()
        .call(&[])
        .unwrap_err();
    assert!(matches!(err, SwfError::NotImplemented(_)));
    assert!(err.to_string().starts_with("Opcode 254"), "{}", err);
}

#[test]
fn test_lookup_failures() {
    let interp = SwfInterpreter::new(&swf_file(&scrambler_abc())).unwrap();
    assert!(matches!(
        interp.extract_class("Missing"),
        Err(SwfError::ClassNotFound(_))
    ));
    assert!(matches!(
        interp.extract_function("Scrambler", "unscramble"),
        Err(SwfError::FunctionNotFound { .. })
    ));
}

#[test]
fn test_rejects_damaged_files() {
    let mut truncated = scrambler_abc();
    truncated.truncate(truncated.len() - 4);
    assert!(SwfInterpreter::new(&swf_file(&truncated)).is_err());

    let uncompressed = b"FWS\x0a\x10\x00\x00\x00".to_vec();
    assert!(matches!(
        SwfInterpreter::new(&uncompressed),
        Err(SwfError::Unsupported(_))
    ));
    assert!(SwfInterpreter::new(b"not a movie").is_err());
}
