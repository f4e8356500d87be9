use crate::error::{ProvisionError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// A JSON descriptor taken from a definition header line.
///
/// Trivial descriptors stand for "nothing here": the check is on serialized
/// length, so `{}` (and anything of three characters or fewer once trimmed)
/// is trivial, while four characters or more counts as a real object.
#[derive(Debug, Clone)]
pub struct Descriptor {
    raw: String,
}

impl Descriptor {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.trim().to_string(),
        }
    }

    pub fn is_trivial(&self) -> bool {
        self.raw.len() <= 3
    }

    /// Parses the descriptor into a JSON object, rejecting non-object values
    /// since ids must be injected into it afterwards.
    pub fn parse(&self) -> Result<Value> {
        let value: Value = serde_json::from_str(&self.raw)?;
        if !value.is_object() {
            return Err(ProvisionError::Definition(
                "descriptor is not a JSON object".to_string(),
            ));
        }
        Ok(value)
    }
}

/// A parsed `*.sql` definition file: a fixed four-line comment header
/// followed by the literal query body.
#[derive(Debug, Clone)]
pub struct QueryDefinition {
    pub name: String,
    pub description: String,
    pub visualization: Descriptor,
    pub widget: Descriptor,
    pub sql: String,
}

impl QueryDefinition {
    /// Parses the five-part record. Each header line carries a two-character
    /// comment prefix (`--`) which is stripped before use; the remainder of
    /// the file is the SQL body, kept unmodified including newlines.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut rest = contents;
        let mut header = [""; 4];
        for slot in header.iter_mut() {
            let (line, tail) = rest.split_once('\n').ok_or_else(|| {
                ProvisionError::Definition(
                    "truncated header: expected four comment lines before the query body"
                        .to_string(),
                )
            })?;
            let line = line.strip_suffix('\r').unwrap_or(line);
            *slot = line.get(2..).unwrap_or("").trim();
            rest = tail;
        }

        Ok(Self {
            name: header[0].to_string(),
            description: header[1].to_string(),
            visualization: Descriptor::new(header[2]),
            widget: Descriptor::new(header[3]),
            sql: rest.to_string(),
        })
    }
}

/// Inserts a server-assigned id into a descriptor object, overwriting any
/// value the file may have carried.
pub fn inject_id(descriptor: &mut Value, key: &str, id: i64) -> Result<()> {
    descriptor
        .as_object_mut()
        .ok_or_else(|| ProvisionError::Definition("descriptor is not a JSON object".to_string()))?
        .insert(key.to_string(), Value::from(id));
    Ok(())
}

/// Lists files in `dir` with the given extension, sorted by name so runs are
/// deterministic regardless of directory-listing order.
pub fn definition_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
