//! Parsing of rpm query output into component records.

use crate::core::ImageComponent;
use crate::errors::BuildError;

/// Field separator used in the rpm query format.
pub const RPM_OUTPUT_SEP: char = ';';

/// Query format producing one `;`-separated record per installed package.
pub const RPM_QUERY_FORMAT: &str =
    "%{NAME};%{VERSION};%{RELEASE};%{ARCH};%{EPOCH};%{SIGMD5};%|SIGPGP?{%{SIGPGP:pgpsig}}:{(none)}|\n";

/// Returns the rpm command that lists installed packages in the parseable
/// format, optionally against an alternative rpmdb path.
#[must_use]
pub fn rpm_query_command(dbpath: Option<&str>) -> Vec<String> {
    let mut command = vec!["rpm".to_string()];
    if let Some(dbpath) = dbpath {
        command.push("--dbpath".to_string());
        command.push(dbpath.to_string());
    }
    command.push("-qa".to_string());
    command.push("--qf".to_string());
    command.push(RPM_QUERY_FORMAT.to_string());
    command
}

/// Parses rpm query output lines into component records.
///
/// # Errors
///
/// Returns an invalid-data error for lines that do not match the query
/// format.
pub fn parse_rpm_output(lines: &[String]) -> Result<Vec<ImageComponent>, BuildError> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_rpm_line(line))
        .collect()
}

fn parse_rpm_line(line: &str) -> Result<ImageComponent, BuildError> {
    let fields: Vec<&str> = line.split(RPM_OUTPUT_SEP).collect();
    if fields.len() != 7 {
        return Err(BuildError::invalid_data(format!(
            "malformed rpm output line: '{line}'"
        )));
    }

    let mut component = ImageComponent::rpm(fields[0], fields[1], fields[2], fields[3]);

    if let Some(epoch) = non_none(fields[4]) {
        let epoch = epoch.parse::<u64>().map_err(|_| {
            BuildError::invalid_data(format!("bad epoch '{}' in line '{line}'", fields[4]))
        })?;
        component = component.with_epoch(epoch);
    }
    if let Some(sigmd5) = non_none(fields[5]) {
        component = component.with_sigmd5(sigmd5);
    }
    if let Some(signature) = non_none(fields[6]) {
        component = component.with_signature(signature);
    }

    Ok(component)
}

fn non_none(field: &str) -> Option<&str> {
    match field {
        "" | "(none)" => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_command_default_db() {
        let command = rpm_query_command(None);
        assert_eq!(command[0], "rpm");
        assert!(command.contains(&"-qa".to_string()));
        assert!(!command.contains(&"--dbpath".to_string()));
    }

    #[test]
    fn test_query_command_alternative_db() {
        let command = rpm_query_command(Some("/tmp/rpmdb"));
        assert!(command.contains(&"--dbpath".to_string()));
        assert!(command.contains(&"/tmp/rpmdb".to_string()));
    }

    #[test]
    fn test_parse_signed_package() {
        let lines = vec![
            "bash;5.1.8;4.el9;x86_64;(none);abc123;RSA/SHA256, Tue 01 Jan 2030, Key ID deadbeef"
                .to_string(),
        ];
        let components = parse_rpm_output(&lines).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "bash");
        assert!(components[0].epoch.is_none());
        assert!(components[0].signature.is_some());
    }

    #[test]
    fn test_parse_epoch() {
        let lines = vec!["openssl;3.0.1;43.el9;x86_64;1;def456;(none)".to_string()];
        let components = parse_rpm_output(&lines).unwrap();
        assert_eq!(components[0].epoch, Some(1));
        assert!(components[0].signature.is_none());
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let lines = vec![
            String::new(),
            "bash;5.1.8;4.el9;x86_64;(none);abc;(none)".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(parse_rpm_output(&lines).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let lines = vec!["not an rpm record".to_string()];
        let err = parse_rpm_output(&lines).unwrap_err();
        assert!(matches!(err, BuildError::InvalidData(_)));
    }

    #[test]
    fn test_parse_rejects_bad_epoch() {
        let lines = vec!["bash;5.1.8;4.el9;x86_64;zero;abc;(none)".to_string()];
        assert!(parse_rpm_output(&lines).is_err());
    }
}
