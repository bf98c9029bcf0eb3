//! Parses the dev-function YAML file into named `DevFunction`s, mirroring `dev.Parse` /
//! `dev.ParseFile`. A missing file is not an error — dev mode is opt-in.

use std::collections::HashMap;
use std::path::Path;

use faas_common::DevFunction;

use crate::{Error, Result};

pub fn parse_file(path: &Path) -> Result<HashMap<String, DevFunction>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::SchedulingFailed(format!("unable to read dev config {}: {e}", path.display())))?;
    parse(&contents)
}

pub fn parse(yaml: &str) -> Result<HashMap<String, DevFunction>> {
    let raw: HashMap<String, DevFunction> = serde_yaml::from_str(yaml)
        .map_err(|e| Error::SchedulingFailed(format!("unable to parse dev config: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|(key, mut dev_function)| {
            dev_function.name = format!("dev-{key}");
            (key, dev_function)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_entries_with_dev_prefix() {
        let yaml = r#"
hello:
  handler: main.handler
  runtime: python3.9
  basePath: ./hello
  environment:
    - FOO=bar
"#;
        let parsed = parse(yaml).unwrap();
        let hello = parsed.get("hello").unwrap();
        assert_eq!(hello.name, "dev-hello");
        assert_eq!(hello.handler, "main.handler");
        assert_eq!(hello.base_path, "./hello");
        assert_eq!(hello.environment, vec!["FOO=bar".to_string()]);
    }

    #[test]
    fn missing_file_returns_empty_map_not_error() {
        let result = parse_file(Path::new("/nonexistent/functions.yml")).unwrap();
        assert!(result.is_empty());
    }
}
