//! Config source loading
//!
//! A config source is a TOML, YAML or JSON file whose top-level keys are
//! attribute overrides. Two kinds of keys are special:
//!
//! - `MODULE`: optional string naming the module the source applies to.
//! - names starting with `_` are private and never applied. `_computed` and
//!   `_grid_search` are reserved private sections that declare computed
//!   properties and an in-file grid search.
//!
//! ```toml
//! MODULE = "weather"
//! TODAYS_TEMP_FEATURE = false
//!
//! [_computed.AVERAGE_TEMP_FEATURE]
//! expr = "TODAYS_TEMP_FEATURE"
//! compute_once = false
//!
//! [_grid_search]
//! progress_file = "grid_search.progress"
//!
//! [_grid_search.parameters]
//! LEARNING_RATE = [1e-5, 1e-4, 1e-3]
//! BATCH_SIZE = [64, 128, 256]
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::computed::ComputedProperty;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::grid::GridSearch;
use crate::namespace::{Binding, Namespace};

pub const MODULE_KEY: &str = "MODULE";
const COMPUTED_SECTION: &str = "_computed";
const GRID_SEARCH_SECTION: &str = "_grid_search";

/// One declaration of a source, in file order.
#[derive(Debug, Clone)]
pub enum Declaration {
    Binding(String, Binding),
    /// Expanded into one plain binding per parameter when the source is applied
    GridSearch(GridSearch),
}

/// A parsed config source.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    module: Option<String>,
    declarations: Vec<Declaration>,
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Target-module tag, when the source declares one.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Untagged sources apply to every module; tagged ones only on an exact match.
    pub fn applies_to(&self, module_name: &str) -> bool {
        self.module.as_deref().map_or(true, |tag| tag == module_name)
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// The source's attributes in declaration order.
    ///
    /// A declared grid search is advanced here, once per call, so only call
    /// this for sources that are actually being applied.
    pub fn into_attributes(self) -> Result<Vec<(String, Binding)>> {
        let mut attributes = Vec::new();
        for declaration in self.declarations {
            match declaration {
                Declaration::Binding(name, binding) => attributes.push((name, binding)),
                Declaration::GridSearch(search) => {
                    for (name, value) in search.advance()? {
                        attributes.push((name, Binding::Value(value)));
                    }
                }
            }
        }
        Ok(attributes)
    }
}

/// Parse the config source at `path`. Every call reads the file afresh.
pub fn load_source(path: &Path) -> Result<ConfigSource> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::load(path, format!("cannot read file: {}", e)))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let raw: Value = match ext.as_str() {
        "toml" => {
            let table: toml::Table = toml::from_str(&content)
                .map_err(|e| Error::load(path, format!("invalid TOML: {}", e)))?;
            for (key, value) in &table {
                reject_non_finite_toml(path, key, value)?;
            }
            to_attributes(path, table)?
        }
        "yaml" | "yml" => {
            let document: serde_yaml::Value = serde_yaml::from_str(&content)
                .map_err(|e| Error::load(path, format!("invalid YAML: {}", e)))?;
            reject_non_finite_yaml(path, "", &document)?;
            to_attributes(path, document)?
        }
        "json" => serde_json::from_str(&content)
            .map_err(|e| Error::load(path, format!("invalid JSON: {}", e)))?,
        other => {
            return Err(Error::load(path, format!("unsupported config extension '.{}'", other)))
        }
    };

    let table = match raw {
        Value::Object(table) => table,
        // An empty YAML document
        Value::Null => Map::new(),
        other => {
            return Err(Error::load(
                path,
                format!("top level must be a table of attributes, found {}", other),
            ))
        }
    };

    parse_table(path, table)
}

// Attribute values are JSON values, which have no room for inf or NaN.
fn non_finite(path: &Path, key: &str, value: f64) -> Error {
    Error::load(path, format!("`{}` is {}, which is not a finite number", key, value))
}

fn reject_non_finite_toml(path: &Path, key: &str, value: &toml::Value) -> Result<()> {
    match value {
        toml::Value::Float(f) if !f.is_finite() => Err(non_finite(path, key, *f)),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| reject_non_finite_toml(path, &format!("{}[{}]", key, i), item)),
        toml::Value::Table(table) => table
            .iter()
            .try_for_each(|(k, v)| reject_non_finite_toml(path, &format!("{}.{}", key, k), v)),
        _ => Ok(()),
    }
}

fn reject_non_finite_yaml(path: &Path, key: &str, value: &serde_yaml::Value) -> Result<()> {
    match value {
        serde_yaml::Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Err(non_finite(path, key, f)),
            _ => Ok(()),
        },
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| reject_non_finite_yaml(path, &format!("{}[{}]", key, i), item)),
        serde_yaml::Value::Mapping(mapping) => mapping.iter().try_for_each(|(k, v)| {
            let name = match k {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
            };
            let key = if key.is_empty() { name } else { format!("{}.{}", key, name) };
            reject_non_finite_yaml(path, &key, v)
        }),
        serde_yaml::Value::Tagged(tagged) => reject_non_finite_yaml(path, key, &tagged.value),
        _ => Ok(()),
    }
}

fn to_attributes<T: Serialize>(path: &Path, raw: T) -> Result<Value> {
    serde_json::to_value(raw).map_err(|e| Error::load(path, format!("unsupported value: {}", e)))
}

/// Load a source straight into a fresh namespace named `name`, ignoring its tag.
pub fn load_namespace(name: &str, path: &Path) -> Result<Namespace> {
    let source = load_source(path)?;
    let mut namespace = Namespace::new(name);
    for (attribute, binding) in source.into_attributes()? {
        namespace.set_binding(attribute, binding);
    }
    Ok(namespace)
}

fn parse_table(path: &Path, table: Map<String, Value>) -> Result<ConfigSource> {
    let mut module = None;
    let mut declarations = Vec::new();

    for (key, value) in table {
        match key.as_str() {
            MODULE_KEY => match value {
                Value::String(tag) => module = Some(tag),
                other => {
                    return Err(Error::load(path, format!("MODULE must be a string, found {}", other)))
                }
            },
            COMPUTED_SECTION => declarations.extend(parse_computed(path, value)?),
            GRID_SEARCH_SECTION => declarations.push(parse_grid_search(path, value)?),
            private if private.starts_with('_') => {
                tracing::debug!("Skipping private name {} in {}", private, path.display());
            }
            _ => declarations.push(Declaration::Binding(key, Binding::Value(value))),
        }
    }

    Ok(ConfigSource { path: path.to_path_buf(), module, declarations })
}

fn parse_computed(path: &Path, section: Value) -> Result<Vec<Declaration>> {
    let Value::Object(entries) = section else {
        return Err(Error::load(path, "_computed must be a table of computed properties"));
    };

    let mut declarations = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let Value::Object(entry) = entry else {
            return Err(Error::load(
                path,
                format!("computed property `{}` must be a table with `expr` and `compute_once`", name),
            ));
        };

        let compute_once = match entry.get("compute_once") {
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(Error::load(
                    path,
                    format!("compute_once of `{}` must be a boolean, found {}", name, other),
                ))
            }
            None => {
                return Err(Error::AmbiguousComputedProperty { name, path: path.to_path_buf() })
            }
        };

        let source = match entry.get("expr") {
            Some(Value::String(source)) => source,
            _ => {
                return Err(Error::load(
                    path,
                    format!("computed property `{}` needs an `expr` string", name),
                ))
            }
        };
        let expression = Expression::parse(source)
            .map_err(|e| Error::load(path, format!("computed property `{}`: {}", name, e)))?;

        let property = ComputedProperty::from_expression(compute_once, expression);
        declarations.push(Declaration::Binding(name, Binding::Computed(property)));
    }
    Ok(declarations)
}

fn parse_grid_search(path: &Path, section: Value) -> Result<Declaration> {
    let Value::Object(mut section) = section else {
        return Err(Error::load(path, "_grid_search must be a table"));
    };

    let progress_file = match section.remove("progress_file") {
        Some(Value::String(file)) => file,
        _ => return Err(Error::load(path, "_grid_search needs a `progress_file` string")),
    };
    // Relative progress files live next to the source that declares them.
    let progress_file = match path.parent() {
        Some(dir) if Path::new(&progress_file).is_relative() => dir.join(progress_file),
        _ => PathBuf::from(progress_file),
    };

    let Some(Value::Object(parameters)) = section.remove("parameters") else {
        return Err(Error::load(path, "_grid_search needs a `parameters` table"));
    };

    let mut search = GridSearch::new(progress_file);
    for (name, values) in parameters {
        let Value::Array(values) = values else {
            return Err(Error::load(
                path,
                format!("grid search parameter `{}` must be a list of candidate values", name),
            ));
        };
        search = search.parameter(name, values);
    }
    Ok(Declaration::GridSearch(search))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, content: &str) -> PathBuf {
        let path = dir.path().join(file);
        fs::write(&path, content).expect("write");
        path
    }

    fn names(source: ConfigSource) -> Vec<String> {
        source.into_attributes().expect("attributes").into_iter().map(|(n, _)| n).collect()
    }

    #[test]
    fn test_load_toml_in_declaration_order() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(
            &tmp,
            "config.toml",
            "MODULE = 'weather'\nZETA = 1\nALPHA = 2\n_hidden = 3\nMIDDLE = 'x'\n",
        );

        let source = load_source(&path).expect("load");
        assert_eq!(source.module(), Some("weather"));
        assert!(source.applies_to("weather"));
        assert!(!source.applies_to("weather.config"));
        assert_eq!(names(source), vec!["ZETA", "ALPHA", "MIDDLE"]);
    }

    #[test]
    fn test_untagged_source_applies_everywhere() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(&tmp, "config.yaml", "TODAYS_TEMP_FEATURE: false\n");
        let source = load_source(&path).expect("load");
        assert_eq!(source.module(), None);
        assert!(source.applies_to("anything"));
    }

    #[test]
    fn test_load_json_and_yaml() {
        let tmp = TempDir::new().expect("tmp");
        let json_path = write(&tmp, "c.json", r#"{"MODULE": "weather", "BATCH_SIZE": 32}"#);
        let ns = load_namespace("weather", &json_path).expect("json");
        assert_eq!(ns.get::<u32>("BATCH_SIZE").expect("batch"), 32);
        assert!(!ns.contains("MODULE"));

        let yaml_path = write(&tmp, "empty.yml", "{}\n");
        assert!(load_namespace("weather", &yaml_path).expect("yaml").is_empty());
    }

    #[test]
    fn test_computed_section() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(
            &tmp,
            "property.toml",
            "TODAYS_TEMP_FEATURE = false\n\n[_computed.AVERAGE_TEMP_FEATURE]\nexpr = 'TODAYS_TEMP_FEATURE'\ncompute_once = false\n",
        );
        let mut ns = load_namespace("weather", &path).expect("load");
        let binding = ns.binding("AVERAGE_TEMP_FEATURE").expect("bound");
        assert!(binding.is_computed());
        assert_eq!(ns.get_value("AVERAGE_TEMP_FEATURE").expect("read"), json!(false));

        ns.set("TODAYS_TEMP_FEATURE", true);
        assert_eq!(ns.get_value("AVERAGE_TEMP_FEATURE").expect("read"), json!(true));
    }

    #[test]
    fn test_computed_without_policy_is_ambiguous() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(&tmp, "bad.toml", "[_computed.X]\nexpr = '1'\n");
        let err = load_source(&path).expect_err("ambiguous");
        assert!(matches!(err, Error::AmbiguousComputedProperty { ref name, .. } if name == "X"));
    }

    #[test]
    fn test_computed_with_bad_expression() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(&tmp, "bad.toml", "[_computed.X]\nexpr = '1 +'\ncompute_once = true\n");
        assert!(matches!(load_source(&path), Err(Error::Load { .. })));
    }

    #[test]
    fn test_grid_search_section_advances_on_apply_only() {
        let tmp = TempDir::new().expect("tmp");
        let path = write(
            &tmp,
            "grid.toml",
            "MODULE = 'weather'\n[_grid_search]\nprogress_file = 'grid.progress'\n[_grid_search.parameters]\nLEARNING_RATE = [1e-5, 1e-4]\nBATCH_SIZE = [64, 128]\n",
        );
        let progress = tmp.path().join("grid.progress");

        let source = load_source(&path).expect("load");
        assert!(!progress.exists(), "parsing alone must not advance the search");

        let attributes = source.into_attributes().expect("apply");
        assert_eq!(attributes.len(), 2);
        assert!(matches!(&attributes[1], (n, Binding::Value(v)) if n == "BATCH_SIZE" && *v == json!(64)));
        assert_eq!(fs::read_to_string(&progress).expect("progress"), "1");

        let second = load_source(&path).expect("load").into_attributes().expect("apply");
        assert!(matches!(&second[1], (_, Binding::Value(v)) if *v == json!(128)));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let tmp = TempDir::new().expect("tmp");
        let toml = write(&tmp, "norm.toml", "MAX_NORM = inf\n");
        let err = load_source(&toml).expect_err("inf");
        assert!(matches!(err, Error::Load { ref reason, .. } if reason.contains("MAX_NORM")));

        let nested = write(&tmp, "nested.toml", "[OPTIMIZER]\nbetas = [0.9, nan]\n");
        let err = load_source(&nested).expect_err("nan");
        assert!(err.to_string().contains("OPTIMIZER.betas[1]"));

        let yaml = write(&tmp, "norm.yaml", "MAX_NORM: .inf\n");
        let err = load_source(&yaml).expect_err("yaml inf");
        assert!(matches!(err, Error::Load { ref reason, .. } if reason.contains("MAX_NORM")));

        let finite = write(&tmp, "finite.yaml", "MAX_NORM: 1.5\nLAYERS: [1, 2]\n");
        let ns = load_namespace("weather", &finite).expect("finite");
        assert_eq!(ns.get::<f64>("MAX_NORM").expect("read"), 1.5);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let tmp = TempDir::new().expect("tmp");
        let err = load_source(&tmp.path().join("nope.toml")).expect_err("missing");
        assert!(matches!(err, Error::Load { .. }));
    }

    #[test]
    fn test_rejects_bad_sources() {
        let tmp = TempDir::new().expect("tmp");
        let ext = write(&tmp, "config.py", "X = 1\n");
        assert!(load_source(&ext).is_err());

        let syntax = write(&tmp, "broken.toml", "X = = 1\n");
        assert!(matches!(load_source(&syntax), Err(Error::Load { .. })));

        let list = write(&tmp, "list.json", "[1, 2]");
        assert!(matches!(load_source(&list), Err(Error::Load { .. })));

        let tag = write(&tmp, "tag.toml", "MODULE = 3\n");
        assert!(matches!(load_source(&tag), Err(Error::Load { .. })));
    }
}
