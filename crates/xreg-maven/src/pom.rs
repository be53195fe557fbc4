//! POM parsing into a project document.
//!
//! Uses the quick-xml SAX reader with namespace awareness off. Repeated
//! children (`dependencies/dependency`, `developers/developer`,
//! `licenses/license`) accumulate into lists even when a POM carries a
//! single element, so downstream consumers always see arrays.

use crate::error::{MavenError, Result};
use crate::types::{
    Developer, IssueManagement, License, Organization, PomDependency, PomProject, Scm,
};
use quick_xml::Reader;
use quick_xml::events::Event;

pub fn parse_pom(xml: &str) -> Result<PomProject> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pom = PomProject::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_dep: Option<PomDependency> = None;
    let mut current_dev: Option<Developer> = None;
    let mut current_license: Option<License> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                path.push(tag);
                text_buf.clear();

                match path.join(">").as_str() {
                    "project>dependencies>dependency" => {
                        current_dep = Some(PomDependency::default());
                    }
                    "project>developers>developer" => {
                        current_dev = Some(Developer::default());
                    }
                    "project>licenses>license" => {
                        current_license = Some(License::default());
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e
                    .decode()
                    .ok()
                    .and_then(|decoded| quick_xml::escape::unescape(&decoded).ok().map(|s| s.to_string()))
                    .unwrap_or_default();
            }
            Ok(Event::End(_)) => {
                let joined = path.join(">");
                apply_text(
                    &mut pom,
                    &joined,
                    &text_buf,
                    &mut current_dep,
                    &mut current_dev,
                    &mut current_license,
                );

                match joined.as_str() {
                    "project>dependencies>dependency" => {
                        if let Some(dep) = current_dep.take()
                            && !dep.group_id.is_empty()
                            && !dep.artifact_id.is_empty()
                        {
                            pom.dependencies.push(dep);
                        }
                    }
                    "project>developers>developer" => {
                        if let Some(dev) = current_dev.take() {
                            pom.developers.push(dev);
                        }
                    }
                    "project>licenses>license" => {
                        if let Some(license) = current_license.take() {
                            pom.licenses.push(license);
                        }
                    }
                    _ => {}
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MavenError::parse("pom.xml", e.to_string()));
            }
            _ => {}
        }
    }

    // Parent coordinates fill gaps the POM leaves open; properties feed
    // `${...}` references in dependency versions.
    pom.interpolate();
    Ok(pom)
}

#[allow(clippy::too_many_lines)]
fn apply_text(
    pom: &mut PomProject,
    path: &str,
    text: &str,
    current_dep: &mut Option<PomDependency>,
    current_dev: &mut Option<Developer>,
    current_license: &mut Option<License>,
) {
    let value = || Some(text.to_string());

    match path {
        "project>groupId" => pom.group_id = value(),
        "project>artifactId" => pom.artifact_id = value(),
        "project>version" => pom.version = value(),
        "project>packaging" => pom.packaging = value(),
        "project>name" => pom.name = value(),
        "project>description" => pom.description = value(),
        "project>url" => pom.url = value(),

        // Parent coordinates apply only when the project leaves its own out.
        "project>parent>groupId" => {
            if pom.group_id.is_none() {
                pom.group_id = value();
            }
        }
        "project>parent>version" => {
            if pom.version.is_none() {
                pom.version = value();
            }
        }

        "project>organization>name" => {
            pom.organization.get_or_insert_with(Organization::default).name = value();
        }
        "project>organization>url" => {
            pom.organization.get_or_insert_with(Organization::default).url = value();
        }

        "project>scm>url" => {
            pom.scm.get_or_insert_with(Scm::default).url = value();
        }
        "project>scm>connection" => {
            pom.scm.get_or_insert_with(Scm::default).connection = value();
        }
        "project>scm>developerConnection" => {
            pom.scm.get_or_insert_with(Scm::default).developer_connection = value();
        }

        "project>issueManagement>system" => {
            pom.issue_management
                .get_or_insert_with(IssueManagement::default)
                .system = value();
        }
        "project>issueManagement>url" => {
            pom.issue_management
                .get_or_insert_with(IssueManagement::default)
                .url = value();
        }

        "project>dependencies>dependency>groupId" => {
            if let Some(dep) = current_dep {
                dep.group_id = text.to_string();
            }
        }
        "project>dependencies>dependency>artifactId" => {
            if let Some(dep) = current_dep {
                dep.artifact_id = text.to_string();
            }
        }
        "project>dependencies>dependency>version" => {
            if let Some(dep) = current_dep {
                dep.version = value();
            }
        }
        "project>dependencies>dependency>scope" => {
            if let Some(dep) = current_dep {
                dep.scope = value();
            }
        }
        "project>dependencies>dependency>optional" => {
            if let Some(dep) = current_dep {
                dep.optional = value();
            }
        }

        "project>developers>developer>id" => {
            if let Some(dev) = current_dev {
                dev.id = value();
            }
        }
        "project>developers>developer>name" => {
            if let Some(dev) = current_dev {
                dev.name = value();
            }
        }
        "project>developers>developer>email" => {
            if let Some(dev) = current_dev {
                dev.email = value();
            }
        }
        "project>developers>developer>url" => {
            if let Some(dev) = current_dev {
                dev.url = value();
            }
        }

        "project>licenses>license>name" => {
            if let Some(license) = current_license {
                license.name = value();
            }
        }
        "project>licenses>license>url" => {
            if let Some(license) = current_license {
                license.url = value();
            }
        }

        _ => {
            if let Some(key) = path.strip_prefix("project>properties>")
                && !key.contains('>')
            {
                pom.properties.insert(key.to_string(), text.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_pom() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<project>
  <groupId>org.apache.commons</groupId>
  <artifactId>commons-lang3</artifactId>
  <version>3.14.0</version>
  <packaging>jar</packaging>
  <name>Apache Commons Lang</name>
  <description>Helper utilities for java.lang.</description>
  <url>https://commons.apache.org/lang/</url>
  <dependencies>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.13.2</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>"#;

        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("org.apache.commons"));
        assert_eq!(pom.artifact_id.as_deref(), Some("commons-lang3"));
        assert_eq!(pom.version.as_deref(), Some("3.14.0"));
        assert_eq!(pom.packaging.as_deref(), Some("jar"));
        assert_eq!(pom.url.as_deref(), Some("https://commons.apache.org/lang/"));
        assert_eq!(pom.dependencies.len(), 1);
        assert_eq!(pom.dependencies[0].group_id, "junit");
        assert_eq!(pom.dependencies[0].scope.as_deref(), Some("test"));
    }

    #[test]
    fn test_singular_children_become_lists() {
        let xml = r"<project>
  <licenses>
    <license>
      <name>Apache-2.0</name>
      <url>https://www.apache.org/licenses/LICENSE-2.0</url>
    </license>
  </licenses>
  <developers>
    <developer>
      <id>jane</id>
      <name>Jane Doe</name>
    </developer>
  </developers>
</project>";

        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.licenses.len(), 1);
        assert_eq!(pom.licenses[0].name.as_deref(), Some("Apache-2.0"));
        assert_eq!(pom.developers.len(), 1);
        assert_eq!(pom.developers[0].id.as_deref(), Some("jane"));
    }

    #[test]
    fn test_multiple_developers_and_licenses() {
        let xml = r"<project>
  <developers>
    <developer><id>a</id></developer>
    <developer><id>b</id></developer>
  </developers>
  <licenses>
    <license><name>MIT</name></license>
    <license><name>Apache-2.0</name></license>
  </licenses>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.developers.len(), 2);
        assert_eq!(pom.licenses.len(), 2);
    }

    #[test]
    fn test_parent_fallback() {
        let xml = r"<project>
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.0</version>
  </parent>
  <artifactId>demo</artifactId>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("org.springframework.boot"));
        assert_eq!(pom.artifact_id.as_deref(), Some("demo"));
        assert_eq!(pom.version.as_deref(), Some("3.2.0"));
    }

    #[test]
    fn test_own_coordinates_beat_parent() {
        let xml = r"<project>
  <parent>
    <groupId>parent.group</groupId>
    <version>1.0</version>
  </parent>
  <groupId>own.group</groupId>
  <version>2.0</version>
  <artifactId>lib</artifactId>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("own.group"));
        assert_eq!(pom.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_scm_and_issue_management() {
        let xml = r"<project>
  <scm>
    <url>https://github.com/junit-team/junit4</url>
    <connection>scm:git:git://github.com/junit-team/junit4.git</connection>
    <developerConnection>scm:git:ssh://github.com/junit-team/junit4.git</developerConnection>
  </scm>
  <issueManagement>
    <system>github</system>
    <url>https://github.com/junit-team/junit4/issues</url>
  </issueManagement>
</project>";
        let pom = parse_pom(xml).unwrap();
        let scm = pom.scm.unwrap();
        assert_eq!(scm.url.as_deref(), Some("https://github.com/junit-team/junit4"));
        assert!(scm.connection.unwrap().starts_with("scm:git:git"));
        assert!(scm.developer_connection.unwrap().starts_with("scm:git:ssh"));
        let issues = pom.issue_management.unwrap();
        assert_eq!(issues.system.as_deref(), Some("github"));
    }

    #[test]
    fn test_property_interpolation_in_versions() {
        let xml = r"<project>
  <version>5.0.0</version>
  <properties>
    <guava.version>33.0.0-jre</guava.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>com.google.guava</groupId>
      <artifactId>guava</artifactId>
      <version>${guava.version}</version>
    </dependency>
  </dependencies>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.dependencies[0].version.as_deref(), Some("33.0.0-jre"));
    }

    #[test]
    fn test_namespaced_pom() {
        let xml = r#"<project xmlns="http://maven.apache.org/POM/4.0.0">
  <groupId>junit</groupId>
  <artifactId>junit</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.hamcrest</groupId>
      <artifactId>hamcrest-core</artifactId>
      <version>1.3</version>
    </dependency>
  </dependencies>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.dependencies.len(), 1);
        assert_eq!(pom.dependencies[0].artifact_id, "hamcrest-core");
    }

    #[test]
    fn test_dependency_management_not_collected() {
        let xml = r"<project>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>managed</groupId>
        <artifactId>only</artifactId>
        <version>1.0</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert!(pom.dependencies.is_empty());
    }

    #[test]
    fn test_incomplete_dependency_dropped() {
        let xml = r"<project>
  <dependencies>
    <dependency>
      <artifactId>orphan</artifactId>
    </dependency>
  </dependencies>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert!(pom.dependencies.is_empty());
    }

    #[test]
    fn test_malformed_pom_errors() {
        let result = parse_pom(r#"<project attr="unclosed></project>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_xml_entities_unescaped() {
        let xml = r"<project>
  <description>Tools &amp; helpers</description>
</project>";
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.description.as_deref(), Some("Tools & helpers"));
    }
}
