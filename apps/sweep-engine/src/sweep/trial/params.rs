//! Injecting a parameter combination into a workspace config file.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::sweep::grid::{ParamCombination, ParamValue};

use super::TrialError;

/// On-disk format of a workspace config file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Merge `params` into the `section` table of the config at `path`.
///
/// A missing or empty file starts from an empty document. Existing keys are
/// overwritten, new keys are added, everything else is kept.
pub fn merge_parameters(
    path: &Path,
    section: &str,
    params: &ParamCombination,
) -> Result<(), TrialError> {
    let format = ConfigFormat::from_path(path);
    let mut document = load_document(path, format)?;

    let Value::Object(root) = &mut document else {
        return Err(config_error(path, "top level is not a mapping"));
    };

    let table = root
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if table.is_null() {
        *table = Value::Object(Map::new());
    }
    let Value::Object(table) = table else {
        return Err(config_error(
            path,
            &format!("section '{section}' is not a mapping"),
        ));
    };

    for (name, value) in params.iter() {
        table.insert(name.to_string(), to_json(value));
    }

    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&document)
            .map_err(|e| config_error(path, &e.to_string()))?,
        ConfigFormat::Yaml => serde_yaml_bw::to_string(&document)
            .map_err(|e| config_error(path, &e.to_string()))?,
    };
    fs::write(path, rendered).map_err(|e| config_error(path, &e.to_string()))
}

fn load_document(path: &Path, format: ConfigFormat) -> Result<Value, TrialError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(config_error(path, &e.to_string())),
    };

    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let document: Value = match format {
        ConfigFormat::Json => {
            serde_json::from_str(&contents).map_err(|e| config_error(path, &e.to_string()))?
        }
        ConfigFormat::Yaml => {
            serde_yaml_bw::from_str(&contents).map_err(|e| config_error(path, &e.to_string()))?
        }
    };

    Ok(if document.is_null() {
        Value::Object(Map::new())
    } else {
        document
    })
}

fn to_json(value: ParamValue) -> Value {
    match value {
        ParamValue::Int(v) => Value::Number(Number::from(v)),
        ParamValue::Float(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
    }
}

fn config_error(path: &Path, message: &str) -> TrialError {
    TrialError::Config(format!("{}: {message}", path.display()))
}
