// Mon Aug 03 2026 - Alex

use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Per-context state visible to an operation at call time.
pub struct OpState {
    /// Invocations handled by this context so far, this call included.
    pub invocations: u64,
}

pub type NativeOp = fn(&OpState, &[u8]) -> Result<Vec<u8>, String>;

static BUILTINS: Lazy<IndexMap<&'static str, NativeOp>> = Lazy::new(|| {
    let mut table: IndexMap<&'static str, NativeOp> = IndexMap::new();
    table.insert("double", op_double);
    table.insert("upper", op_upper);
    table.insert("lower", op_lower);
    table.insert("reverse", op_reverse);
    table.insert("length", op_length);
    table.insert("words", op_words);
    table.insert("checksum", op_checksum);
    table.insert("parse-int", op_parse_int);
    table.insert("calls", op_calls);
    table.insert("fail", op_fail);
    table
});

pub fn lookup(name: &str) -> Option<NativeOp> {
    BUILTINS.get(name).copied()
}

pub fn names() -> Vec<&'static str> {
    BUILTINS.keys().copied().collect()
}

/// Module source exposing every builtin under its own name.
pub fn default_module_source() -> String {
    names().join("\n")
}

fn op_double(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(payload.len() * 2);
    out.extend_from_slice(payload);
    out.extend_from_slice(payload);
    Ok(out)
}

fn op_upper(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    Ok(payload.iter().map(|b| b.to_ascii_uppercase()).collect())
}

fn op_lower(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    Ok(payload.iter().map(|b| b.to_ascii_lowercase()).collect())
}

fn op_reverse(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    Ok(payload.iter().rev().copied().collect())
}

fn op_length(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    Ok(payload.len().to_string().into_bytes())
}

fn op_words(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    let text = String::from_utf8_lossy(payload);
    Ok(text.split_whitespace().count().to_string().into_bytes())
}

fn op_checksum(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    // FNV-1a, 64 bit
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in payload {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    Ok(format!("{:016x}", hash).into_bytes())
}

fn op_parse_int(_state: &OpState, payload: &[u8]) -> Result<Vec<u8>, String> {
    let text = std::str::from_utf8(payload).map_err(|e| format!("payload is not utf-8: {}", e))?;
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|e| format!("payload is not an integer: {}", e))?;
    Ok(value.to_string().into_bytes())
}

fn op_calls(state: &OpState, _payload: &[u8]) -> Result<Vec<u8>, String> {
    Ok(state.invocations.to_string().into_bytes())
}

fn op_fail(_state: &OpState, _payload: &[u8]) -> Result<Vec<u8>, String> {
    Err("unconditional failure".to_string())
}
