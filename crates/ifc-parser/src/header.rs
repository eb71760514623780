//! Phase A — header scan (spec §4.3).

use crate::value::parse_args;
use ifc_core::{CoreError, SchemaVersion};

#[derive(Debug, Clone, Default)]
pub struct HeaderInfo {
    pub schema: SchemaVersion,
    pub file_name: Option<String>,
    pub timestamp: Option<String>,
    pub description: Vec<String>,
}

/// Byte range of the `DATA` section's contents, exclusive of the
/// `DATA;`/`ENDSEC;` bracketing keywords.
#[derive(Debug)]
pub struct DataSection {
    pub start: usize,
    pub end: usize,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    memchr::memmem::find(&haystack[from..], needle).map(|p| p + from)
}

fn extract_call(source: &[u8], keyword: &[u8]) -> Option<(usize, Vec<crate::value::Value>)> {
    let kw_pos = find(source, keyword, 0)?;
    let paren = kw_pos + keyword.len();
    if source.get(paren).copied() != Some(b'(') {
        return None;
    }
    let args = parse_args(&source[paren..]).ok()?;
    Some((kw_pos, args))
}

pub fn parse_header(source: &[u8]) -> Result<(HeaderInfo, DataSection), CoreError> {
    let header_end = find(source, b"ENDSEC", 0).ok_or_else(|| CoreError::MalformedHeader {
        offset: 0,
        reason: "missing HEADER ENDSEC;".into(),
    })?;
    let header_bytes = &source[..header_end];

    let schema = extract_call(header_bytes, b"FILE_SCHEMA")
        .and_then(|(_, args)| args.first().and_then(|v| v.as_list()).and_then(|l| l.first()).and_then(|v| v.as_str()).map(str::to_string))
        .and_then(|token| SchemaVersion::from_token(&token))
        .ok_or_else(|| CoreError::MalformedHeader {
            offset: 0,
            reason: "missing or unrecognized FILE_SCHEMA".into(),
        })?;

    let (file_name, timestamp) = extract_call(header_bytes, b"FILE_NAME")
        .map(|(_, args)| {
            let name = args.first().and_then(|v| v.as_str()).map(str::to_string);
            let ts = args.get(1).and_then(|v| v.as_str()).map(str::to_string);
            (name, ts)
        })
        .unwrap_or((None, None));

    let description = extract_call(header_bytes, b"FILE_DESCRIPTION")
        .and_then(|(_, args)| args.first().and_then(|v| v.as_list()).map(|l| {
            l.iter().filter_map(|v| v.as_str()).map(str::to_string).collect()
        }))
        .unwrap_or_default();

    let data_kw = find(source, b"DATA", header_end).ok_or_else(|| CoreError::MalformedHeader {
        offset: header_end,
        reason: "missing DATA section".into(),
    })?;
    let data_start = find(source, b";", data_kw).ok_or_else(|| CoreError::MalformedHeader {
        offset: data_kw,
        reason: "malformed DATA keyword".into(),
    })? + 1;

    let data_end = find(source, b"ENDSEC", data_start).ok_or_else(|| CoreError::UnterminatedData {
        offset: data_start,
    })?;

    Ok((
        HeaderInfo {
            schema,
            file_name,
            timestamp,
            description,
        },
        DataSection {
            start: data_start,
            end: data_end,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nFILE_NAME('a.ifc','2024-01-01T00:00:00',('Author'),('Org'),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n#1=IFCPROJECT('x',$,$,$,$,$,$,$,$);\nENDSEC;\nEND-ISO-10303-21;\n";

    #[test]
    fn extracts_schema_and_data_bounds() {
        let (header, data) = parse_header(SAMPLE).unwrap();
        assert_eq!(header.schema, SchemaVersion::Ifc4);
        assert_eq!(header.file_name.as_deref(), Some("a.ifc"));
        assert!(&SAMPLE[data.start..data.end].starts_with(b"\n#1=IFCPROJECT"));
    }

    #[test]
    fn unrecognized_schema_is_fatal() {
        let bad = std::str::from_utf8(SAMPLE).unwrap().replace("IFC4", "IFC5").into_bytes();
        assert!(parse_header(&bad).is_err());
    }

    #[test]
    fn missing_data_endsec_is_unterminated() {
        let truncated = &SAMPLE[..SAMPLE.len() - 40];
        match parse_header(truncated) {
            Err(CoreError::UnterminatedData { .. }) => {}
            other => panic!("expected UnterminatedData, got {other:?}"),
        }
    }
}
