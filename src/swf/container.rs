//! SWF container: header check, decompression and tag scanning

use super::{Result, SwfError};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Tag type carrying an ABC bytecode block
pub const DOABC_TAG: u16 = 82;

/// Offset of the compressed body; signature, version and file length precede it
const BODY_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub code: u16,
    pub data: &'a [u8],
}

/// Check the signature and inflate the body of a `CWS` file
pub fn decompress(file: &[u8]) -> Result<Vec<u8>> {
    if file.get(1..3) != Some(b"WS".as_slice()) {
        let head = &file[..file.len().min(3)];
        return Err(SwfError::structural(
            0,
            format!("Not an SWF file; header is {:?}", String::from_utf8_lossy(head)),
        ));
    }
    if file[0] != b'C' {
        return Err(SwfError::Unsupported(format!(
            "Unsupported compression format {:?}",
            file[0] as char
        )));
    }
    let body = file
        .get(BODY_OFFSET..)
        .ok_or_else(|| SwfError::structural(file.len(), "file ends inside the header"))?;
    let mut content = Vec::new();
    ZlibDecoder::new(body)
        .read_to_end(&mut content)
        .map_err(|e| SwfError::structural(BODY_OFFSET, format!("cannot inflate body: {}", e)))?;
    Ok(content)
}

/// Split an inflated body into its tags
pub fn tags(content: &[u8]) -> Result<Vec<Tag<'_>>> {
    let first = *content
        .first()
        .ok_or_else(|| SwfError::structural(0, "empty SWF body"))?;
    // frame rectangle: 5-bit field width then four fields, padded to a byte
    let nbits = usize::from(first >> 3);
    let rect_len = (5 + 4 * nbits + 7) / 8;
    // frame rate and frame count follow the rectangle
    let mut pos = rect_len + 4;

    let mut tags = Vec::new();
    while pos < content.len() {
        let header = content
            .get(pos..pos + 2)
            .ok_or_else(|| SwfError::structural(pos, "truncated tag header"))?;
        let header = LittleEndian::read_u16(header);
        pos += 2;
        let code = header >> 6;
        let mut len = usize::from(header & 0x3f);
        if len == 0x3f {
            let long = content
                .get(pos..pos + 4)
                .ok_or_else(|| SwfError::structural(pos, "truncated long tag length"))?;
            len = LittleEndian::read_u32(long) as usize;
            pos += 4;
        }
        let end = pos
            .checked_add(len)
            .filter(|end| *end <= content.len())
            .ok_or_else(|| {
                SwfError::structural(
                    pos,
                    format!(
                        "Tag {} ends at {}+{} - that's longer than the file ({})",
                        code,
                        pos,
                        len,
                        content.len()
                    ),
                )
            })?;
        tags.push(Tag {
            code,
            data: &content[pos..end],
        });
        pos = end;
    }
    Ok(tags)
}

/// Return the ABC bytes of the first `DoABC` tag, past its flags and name
pub fn extract_abc(file: &[u8]) -> Result<Vec<u8>> {
    let content = decompress(file)?;
    let tag = tags(&content)?
        .into_iter()
        .find(|t| t.code == DOABC_TAG)
        .ok_or_else(|| SwfError::structural(content.len(), "no DoABC tag in file"))?;
    let name_end = tag
        .data
        .iter()
        .skip(4)
        .position(|b| *b == 0)
        .map(|i| i + 4 + 1)
        .ok_or_else(|| SwfError::structural(0, "unterminated DoABC name"))?;
    Ok(tag.data[name_end..].to_vec())
}
