//! Clover XML decoder
//!
//! Turns a Clover document into a [`CoverageReport`]. All schema checks happen
//! here, so everything downstream works on validated counters.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{CoverageError, Result};

const METRICS_PATH: &str = "coverage/project/metrics";

/// A decoded Clover report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub generated: Option<u64>,
    pub clover: Option<String>,
    pub project: ProjectReport,
}

/// The first `<project>` of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub name: Option<String>,
    pub timestamp: Option<u64>,
    pub metrics: ProjectMetrics,
}

/// Counters of the project-level `<metrics>` node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectMetrics {
    pub elements: u64,
    pub covered_elements: u64,
    pub statements: u64,
    pub covered_statements: u64,
    pub conditionals: u64,
    pub covered_conditionals: u64,
    pub methods: u64,
    pub covered_methods: u64,
    pub files: Option<u64>,
    pub classes: Option<u64>,
    pub packages: Option<u64>,
    pub loc: Option<u64>,
    pub ncloc: Option<u64>,
}

impl ProjectMetrics {
    fn from_attributes(attrs: &HashMap<String, String>) -> Result<Self> {
        let metrics = ProjectMetrics {
            elements: required(attrs, "elements")?,
            covered_elements: required(attrs, "coveredelements")?,
            statements: required(attrs, "statements")?,
            covered_statements: required(attrs, "coveredstatements")?,
            conditionals: required(attrs, "conditionals")?,
            covered_conditionals: required(attrs, "coveredconditionals")?,
            methods: required(attrs, "methods")?,
            covered_methods: required(attrs, "coveredmethods")?,
            files: optional(attrs, "files"),
            classes: optional(attrs, "classes"),
            packages: optional(attrs, "packages"),
            loc: optional(attrs, "loc"),
            ncloc: optional(attrs, "ncloc"),
        };

        for (name, covered, total) in [
            ("elements", metrics.covered_elements, metrics.elements),
            ("statements", metrics.covered_statements, metrics.statements),
            ("conditionals", metrics.covered_conditionals, metrics.conditionals),
            ("methods", metrics.covered_methods, metrics.methods),
        ] {
            if covered > total {
                return Err(CoverageError::Schema(format!(
                    "{}@covered{} ({}) exceeds {}@{} ({})",
                    METRICS_PATH, name, covered, METRICS_PATH, name, total
                )));
            }
        }

        Ok(metrics)
    }
}

/// Read and decode a Clover report from disk
pub async fn read_file(path: impl AsRef<Path>) -> Result<CoverageReport> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CoverageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let report = parse_clover_str(&content)?;
    debug!(path = %path.display(), project = ?report.project.name, "decoded clover report");
    Ok(report)
}

/// Decode Clover XML content from a string
pub fn parse_clover_str(content: &str) -> Result<CoverageReport> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut decoder = Decoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                decoder.visit(e, reader.buffer_position())?;
                decoder.stack.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(ref e)) => {
                decoder.visit(e, reader.buffer_position())?;
            }
            Ok(Event::End(_)) => {
                decoder.stack.pop();
            }
            Ok(Event::Text(ref e)) => {
                let position = reader.buffer_position();
                let text = e.unescape().map_err(|err| CoverageError::MalformedDocument {
                    position,
                    message: err.to_string(),
                })?;
                if decoder.stack.is_empty() && !text.trim().is_empty() {
                    return Err(outside_root(position));
                }
            }
            Ok(Event::CData(_)) if decoder.stack.is_empty() => {
                return Err(outside_root(reader.buffer_position()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CoverageError::MalformedDocument {
                    position: reader.buffer_position(),
                    message: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = decoder.stack.last() {
        return Err(CoverageError::MalformedDocument {
            position: content.len(),
            message: format!(
                "unexpected end of document, <{}> is not closed",
                String::from_utf8_lossy(open)
            ),
        });
    }

    decoder.finish()
}

fn outside_root(position: usize) -> CoverageError {
    CoverageError::MalformedDocument {
        position,
        message: "content outside the root element".to_string(),
    }
}

/// Walks the whole document before reporting schema problems, so that
/// malformed XML always wins over a missing node.
#[derive(Default)]
struct Decoder {
    stack: Vec<Vec<u8>>,
    root_seen: bool,
    schema_error: Option<CoverageError>,
    generated: Option<u64>,
    clover: Option<String>,
    projects_seen: usize,
    project_name: Option<String>,
    project_timestamp: Option<u64>,
    metrics: Option<ProjectMetrics>,
}

impl Decoder {
    fn visit(&mut self, e: &BytesStart, position: usize) -> Result<()> {
        // Every element gets its attributes checked, not only the ones we read.
        let attrs = attributes(e, position)?;
        let name = e.name();
        let name = name.as_ref();

        match self.stack.len() {
            0 => {
                if self.root_seen {
                    return Err(CoverageError::MalformedDocument {
                        position,
                        message: "multiple root elements".to_string(),
                    });
                }
                self.root_seen = true;

                if name != b"coverage" {
                    self.schema_error = Some(CoverageError::Schema(format!(
                        "expected <coverage> root element, found <{}>",
                        String::from_utf8_lossy(name)
                    )));
                    return Ok(());
                }

                self.generated = optional(&attrs, "generated");
                self.clover = attrs.get("clover").cloned();
            }
            _ if self.schema_error.is_some() => {}
            1 if name == b"project" => {
                self.projects_seen += 1;
                // Later projects are ignored, the first one is authoritative.
                if self.projects_seen == 1 {
                    self.project_name = attrs.get("name").cloned();
                    self.project_timestamp = optional(&attrs, "timestamp");
                }
            }
            2 if name == b"metrics"
                && self.projects_seen == 1
                && self.metrics.is_none()
                && self.stack[1] == b"project" =>
            {
                match ProjectMetrics::from_attributes(&attrs) {
                    Ok(metrics) => self.metrics = Some(metrics),
                    Err(err) => self.schema_error = Some(err),
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn finish(self) -> Result<CoverageReport> {
        if let Some(err) = self.schema_error {
            return Err(err);
        }
        if !self.root_seen {
            return Err(CoverageError::Schema(
                "missing coverage root element".to_string(),
            ));
        }
        if self.projects_seen == 0 {
            return Err(CoverageError::Schema("missing coverage/project".to_string()));
        }
        let metrics = self
            .metrics
            .ok_or_else(|| CoverageError::Schema(format!("missing {}", METRICS_PATH)))?;

        Ok(CoverageReport {
            generated: self.generated,
            clover: self.clover,
            project: ProjectReport {
                name: self.project_name,
                timestamp: self.project_timestamp,
                metrics,
            },
        })
    }
}

fn attributes(e: &BytesStart, position: usize) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    let mut iter = e.attributes();
    iter.with_checks(true);

    for attr in iter {
        let attr = attr.map_err(|err| CoverageError::MalformedDocument {
            position,
            message: err.to_string(),
        })?;
        let value = attr
            .unescape_value()
            .map_err(|err| CoverageError::MalformedDocument {
                position,
                message: err.to_string(),
            })?;
        attrs.insert(
            String::from_utf8_lossy(attr.key.as_ref()).to_string(),
            value.to_string(),
        );
    }

    Ok(attrs)
}

fn required(attrs: &HashMap<String, String>, key: &str) -> Result<u64> {
    let value = attrs
        .get(key)
        .ok_or_else(|| CoverageError::Schema(format!("missing {}@{}", METRICS_PATH, key)))?;

    value.trim().parse::<u64>().map_err(|_| {
        CoverageError::Schema(format!(
            "{}@{} is not a non-negative integer: {:?}",
            METRICS_PATH, key, value
        ))
    })
}

fn optional(attrs: &HashMap<String, String>, key: &str) -> Option<u64> {
    attrs.get(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = include_str!("../../tests/fixtures/clover.xml");

    #[test]
    fn test_parse_fixture() {
        let report = parse_clover_str(FIXTURE).unwrap();

        assert_eq!(report.generated, Some(1589288220123));
        assert_eq!(report.project.name.as_deref(), Some("All files"));

        let metrics = &report.project.metrics;
        assert_eq!(metrics.elements, 66);
        assert_eq!(metrics.covered_elements, 45);
        assert_eq!(metrics.statements, 34);
        assert_eq!(metrics.covered_statements, 24);
        assert_eq!(metrics.methods, 12);
        assert_eq!(metrics.covered_methods, 10);
        assert_eq!(metrics.conditionals, 20);
        assert_eq!(metrics.covered_conditionals, 11);
        assert_eq!(metrics.files, Some(2));
        assert_eq!(metrics.classes, None);
    }

    #[test]
    fn test_nested_metrics_are_ignored() {
        // Package metrics come first here; only the direct child of <project> counts.
        let xml = r#"<coverage>
  <project name="p">
    <package name="a">
      <metrics elements="1" coveredelements="0" statements="1" coveredstatements="0"
               conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
    </package>
    <metrics elements="10" coveredelements="5" statements="8" coveredstatements="4"
             conditionals="2" coveredconditionals="1" methods="3" coveredmethods="3"/>
  </project>
</coverage>"#;

        let report = parse_clover_str(xml).unwrap();
        assert_eq!(report.project.metrics.elements, 10);
        assert_eq!(report.project.metrics.covered_statements, 4);
    }

    #[test]
    fn test_first_project_is_authoritative() {
        let xml = r#"<coverage>
  <project name="first">
    <metrics elements="4" coveredelements="1" statements="4" coveredstatements="1"
             conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
  </project>
  <project name="second">
    <metrics elements="4" coveredelements="4" statements="4" coveredstatements="4"
             conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
  </project>
</coverage>"#;

        let report = parse_clover_str(xml).unwrap();
        assert_eq!(report.project.name.as_deref(), Some("first"));
        assert_eq!(report.project.metrics.covered_statements, 1);
    }

    #[test]
    fn test_missing_metrics_is_schema_error() {
        let err = parse_clover_str("<coverage><project name=\"x\"></project></coverage>")
            .unwrap_err();
        assert!(matches!(err, CoverageError::Schema(_)));
        assert!(err.to_string().contains("coverage/project/metrics"));

        let err = parse_clover_str("<coverage></coverage>").unwrap_err();
        assert!(err.to_string().contains("missing coverage/project"));
    }

    #[test]
    fn test_wrong_root_is_schema_error() {
        let err = parse_clover_str("<report><project/></report>").unwrap_err();
        assert!(matches!(err, CoverageError::Schema(_)));
    }

    #[test]
    fn test_missing_attribute_is_named() {
        let xml = r#"<coverage><project>
  <metrics elements="4" coveredelements="1" statements="4"
           conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
</project></coverage>"#;

        let err = parse_clover_str(xml).unwrap_err();
        assert!(matches!(err, CoverageError::Schema(_)));
        assert!(err.to_string().contains("coverage/project/metrics@coveredstatements"));
    }

    #[test]
    fn test_covered_above_total_is_rejected() {
        let xml = r#"<coverage><project>
  <metrics elements="4" coveredelements="1" statements="4" coveredstatements="5"
           conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
</project></coverage>"#;

        let err = parse_clover_str(xml).unwrap_err();
        assert!(matches!(err, CoverageError::Schema(_)));
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_clover_str("<coverage><project></coverage>").unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));

        let err = parse_clover_str("<coverage><project>").unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));
        assert!(err.to_string().contains("<project> is not closed"));
    }

    fn wrap_project(before: &str, inside: &str, after: &str) -> String {
        format!(
            r#"{before}<coverage><project name="p">
  <metrics elements="4" coveredelements="1" statements="4" coveredstatements="1"
           conditionals="0" coveredconditionals="0" methods="0" coveredmethods="0"/>
  {inside}
</project></coverage>{after}"#
        )
    }

    #[test]
    fn test_wrapped_document_is_valid() {
        let report = parse_clover_str(&wrap_project("", "<file name=\"a.js\"/>", "\n")).unwrap();
        assert_eq!(report.project.metrics.elements, 4);
    }

    #[test]
    fn test_bad_attributes_on_any_element() {
        for inside in [r#"<file name=oops/>"#, r#"<file a="1" a="2"/>"#] {
            let err = parse_clover_str(&wrap_project("", inside, "")).unwrap_err();
            assert!(
                matches!(err, CoverageError::MalformedDocument { .. }),
                "{inside}: {err}"
            );
        }
    }

    #[test]
    fn test_undefined_entity_in_text() {
        let err = parse_clover_str(&wrap_project("", "<line>&bogus;</line>", "")).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));

        let report = parse_clover_str(&wrap_project("", "<line>a &amp; b</line>", "")).unwrap();
        assert_eq!(report.project.name.as_deref(), Some("p"));
    }

    #[test]
    fn test_text_outside_root() {
        let err = parse_clover_str(&wrap_project("garbage", "", "")).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));

        let err = parse_clover_str(&wrap_project("", "", "trailing")).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));
        assert!(err.to_string().contains("outside the root element"));
    }

    #[test]
    fn test_malformed_wins_over_schema() {
        let err = parse_clover_str("<report><x>").unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));

        // Missing attribute first, broken nesting later.
        let xml = r#"<coverage><project><metrics elements="1"/></coverage>"#;
        let err = parse_clover_str(xml).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(dir.path().join("unknown.xml")).await.unwrap_err();

        assert!(matches!(err, CoverageError::Io { .. }));
        assert!(err
            .to_string()
            .to_lowercase()
            .contains("no such file or directory"));
    }

    #[tokio::test]
    async fn test_read_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let report = read_file(file.path()).await.unwrap();
        assert_eq!(report.project.metrics.statements, 34);
    }
}
