use anyhow::{Context, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
struct PresetPlan {
    version: u32,
    project: String,
    checks: Vec<CheckEntry>,
}

#[derive(Debug, Clone, Serialize)]
struct CheckEntry {
    check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<BTreeMap<String, Value>>,
}

pub fn generate_preset(name: &str, destination: &Path) -> Result<PathBuf> {
    let preset = match name {
        "python" => python_preset(),
        "rust" => rust_preset(),
        "minimal" => minimal_preset(),
        other => anyhow::bail!("Unknown preset '{other}'"),
    };

    let rendered = serde_yaml::to_string(&preset)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write preset plan: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}

pub fn known_presets() -> &'static [&'static str] {
    &["python", "rust", "minimal"]
}

fn python_preset() -> PresetPlan {
    PresetPlan {
        version: 1,
        project: ".".to_string(),
        checks: vec![
            CheckEntry {
                check: "style".to_string(),
                params: Some(params(&[("targets", list(&["src", "tests", "docs"]))])),
            },
            CheckEntry {
                check: "imports".to_string(),
                params: Some(params(&[("targets", list(&["src", "tests"]))])),
            },
            CheckEntry {
                check: "manifest".to_string(),
                params: None,
            },
            CheckEntry {
                check: "docs".to_string(),
                params: None,
            },
            CheckEntry {
                check: "tests".to_string(),
                params: None,
            },
        ],
    }
}

fn rust_preset() -> PresetPlan {
    PresetPlan {
        version: 1,
        project: ".".to_string(),
        checks: vec![
            cargo_entry("fmt", &["fmt", "--check"]),
            cargo_entry("clippy", &["clippy", "--all-targets", "--", "-D", "warnings"]),
            cargo_entry("doc", &["doc", "--no-deps"]),
            cargo_entry("test", &["test"]),
        ],
    }
}

fn minimal_preset() -> PresetPlan {
    PresetPlan {
        version: 1,
        project: ".".to_string(),
        checks: vec![
            CheckEntry {
                check: "style".to_string(),
                params: None,
            },
            CheckEntry {
                check: "tests".to_string(),
                params: None,
            },
        ],
    }
}

fn cargo_entry(label: &str, args: &[&str]) -> CheckEntry {
    CheckEntry {
        check: "command".to_string(),
        params: Some(params(&[
            ("label", Value::String(label.to_string())),
            ("program", Value::String("cargo".to_string())),
            ("args", list(args)),
        ])),
    }
}

fn params(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

fn list(items: &[&str]) -> Value {
    Value::Sequence(
        items
            .iter()
            .map(|item| Value::String((*item).to_string()))
            .collect(),
    )
}
