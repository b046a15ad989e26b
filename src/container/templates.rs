//! Build and composition descriptor templates

use super::EntryPoint;
use serde::Serialize;
use std::collections::BTreeMap;

pub const PYTHON_BASE_IMAGE: &str = "python:3.11-slim";
pub const NODE_BASE_IMAGE: &str = "node:20-slim";
pub const JAVA_BASE_IMAGE: &str = "eclipse-temurin:17";
const MAVEN_BUILD_IMAGE: &str = "maven:3.9-eclipse-temurin-17";

const JAVA_AGENT_URL: &str = "https://github.com/open-telemetry/opentelemetry-java-instrumentation/releases/latest/download/opentelemetry-javaagent.jar";
const NODE_WRAPPER: &str = "otel-wrapper.js";

/// Network key used inside the compose file
pub const TELEMETRY_NETWORK_KEY: &str = "telemetry";

fn exec_form(parts: &[&str]) -> String {
    let quoted: Vec<String> = parts
        .iter()
        .map(|p| serde_json::Value::String((*p).to_string()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

pub fn python_dockerfile(script: &str) -> String {
    format!(
        "FROM {image}\n\
         WORKDIR /app\n\
         COPY . /app\n\
         RUN if [ -f requirements.txt ]; then pip install --no-cache-dir -r requirements.txt; fi \\\n    \
         && pip install --no-cache-dir opentelemetry-distro opentelemetry-exporter-otlp \\\n    \
         && opentelemetry-bootstrap -a install\n\
         CMD {cmd}\n",
        image = PYTHON_BASE_IMAGE,
        cmd = exec_form(&["opentelemetry-instrument", "python", script]),
    )
}

pub fn node_dockerfile(entry: &EntryPoint, has_wrapper: bool) -> String {
    let cmd = match entry {
        EntryPoint::NodeScript(script) => exec_form(&["node", script]),
        _ => exec_form(&["npm", "start"]),
    };
    let wrapper = if has_wrapper {
        format!("ENV NODE_OPTIONS=\"--require ./{}\"\n", NODE_WRAPPER)
    } else {
        String::new()
    };
    format!(
        "FROM {image}\n\
         WORKDIR /app\n\
         COPY . /app\n\
         RUN if [ -f package.json ]; then npm install --omit=dev; fi\n\
         {wrapper}\
         CMD {cmd}\n",
        image = NODE_BASE_IMAGE,
    )
}

pub fn java_dockerfile(entry: &EntryPoint) -> String {
    let agent = format!(
        "ADD {url} /otel/opentelemetry-javaagent.jar\n\
         ENV JAVA_TOOL_OPTIONS=\"-javaagent:/otel/opentelemetry-javaagent.jar\"\n",
        url = JAVA_AGENT_URL,
    );

    match entry {
        EntryPoint::Jar(jar) => format!(
            "FROM {image}\n\
             WORKDIR /app\n\
             COPY . /app\n\
             {agent}\
             CMD {cmd}\n",
            image = JAVA_BASE_IMAGE,
            cmd = exec_form(&["java", "-jar", jar]),
        ),
        EntryPoint::Maven => format!(
            "FROM {builder} AS build\n\
             WORKDIR /src\n\
             COPY . /src\n\
             RUN mvn -q -DskipTests package && cp target/*.jar /src/app.jar\n\
             \n\
             FROM {image}\n\
             WORKDIR /app\n\
             COPY --from=build /src/app.jar /app/app.jar\n\
             {agent}\
             CMD {cmd}\n",
            builder = MAVEN_BUILD_IMAGE,
            image = JAVA_BASE_IMAGE,
            cmd = exec_form(&["java", "-jar", "/app/app.jar"]),
        ),
        EntryPoint::JavaMain(main_class) => format!(
            "FROM {image}\n\
             WORKDIR /app\n\
             COPY . /app\n\
             RUN mkdir -p /app/classes && javac -d /app/classes $(find . -name '*.java')\n\
             {agent}\
             CMD {cmd}\n",
            image = JAVA_BASE_IMAGE,
            cmd = exec_form(&["java", "-cp", "/app/classes", main_class]),
        ),
        other => format!(
            "FROM {image}\n\
             WORKDIR /app\n\
             COPY . /app\n\
             {agent}\
             # no runnable entry point found ({other:?})\n\
             CMD [\"java\", \"-version\"]\n",
            image = JAVA_BASE_IMAGE,
        ),
    }
}

#[derive(Debug, Serialize)]
struct ComposeFile {
    version: &'static str,
    services: BTreeMap<String, ComposeService>,
    networks: BTreeMap<String, ComposeNetwork>,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    build: ComposeBuild,
    image: String,
    container_name: String,
    networks: Vec<String>,
    environment: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ComposeBuild {
    context: String,
    dockerfile: String,
}

#[derive(Debug, Serialize)]
struct ComposeNetwork {
    external: bool,
    name: String,
}

/// Renders the composition descriptor for one service on the shared
/// telemetry network
pub fn compose_file(
    service_name: &str,
    dockerfile_name: &str,
    network: &str,
    otlp_endpoint: &str,
) -> Result<String, serde_yaml::Error> {
    let service = ComposeService {
        build: ComposeBuild {
            context: ".".to_string(),
            dockerfile: dockerfile_name.to_string(),
        },
        image: service_name.to_string(),
        container_name: service_name.to_string(),
        networks: vec![TELEMETRY_NETWORK_KEY.to_string()],
        environment: vec![
            format!("OTEL_SERVICE_NAME={}", service_name),
            format!("OTEL_EXPORTER_OTLP_ENDPOINT={}", otlp_endpoint),
        ],
    };

    let compose = ComposeFile {
        version: "3.8",
        services: BTreeMap::from([(service_name.to_string(), service)]),
        networks: BTreeMap::from([(
            TELEMETRY_NETWORK_KEY.to_string(),
            ComposeNetwork {
                external: true,
                name: network.to_string(),
            },
        )]),
    };

    serde_yaml::to_string(&compose)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_declares_service_network_and_env() {
        let yaml = compose_file(
            "app-0123456789ab",
            "Dockerfile.tracepack",
            "telemetry_default",
            "http://otel-collector:4317",
        )
        .unwrap();

        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let service = &doc["services"]["app-0123456789ab"];
        assert_eq!(service["container_name"].as_str(), Some("app-0123456789ab"));
        assert_eq!(service["build"]["dockerfile"].as_str(), Some("Dockerfile.tracepack"));
        assert_eq!(service["networks"][0].as_str(), Some("telemetry"));

        let env: Vec<&str> = service["environment"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(
            env,
            vec![
                "OTEL_SERVICE_NAME=app-0123456789ab",
                "OTEL_EXPORTER_OTLP_ENDPOINT=http://otel-collector:4317",
            ]
        );

        let network = &doc["networks"]["telemetry"];
        assert_eq!(network["external"].as_bool(), Some(true));
        assert_eq!(network["name"].as_str(), Some("telemetry_default"));
    }

    #[test]
    fn test_python_dockerfile() {
        let dockerfile = python_dockerfile("app.py");
        assert!(dockerfile.starts_with("FROM python:3.11-slim\n"));
        assert!(dockerfile.contains("requirements.txt"));
        assert!(dockerfile.contains(r#"CMD ["opentelemetry-instrument", "python", "app.py"]"#));
    }

    #[test]
    fn test_node_dockerfile_uses_wrapper_when_present() {
        let with = node_dockerfile(&EntryPoint::NodeScript("server.js".to_string()), true);
        assert!(with.starts_with("FROM node:20-slim\n"));
        assert!(with.contains("NODE_OPTIONS=\"--require ./otel-wrapper.js\""));
        assert!(with.contains(r#"CMD ["node", "server.js"]"#));

        let without = node_dockerfile(&EntryPoint::NpmStart, false);
        assert!(!without.contains("NODE_OPTIONS"));
        assert!(without.contains(r#"CMD ["npm", "start"]"#));
    }

    #[test]
    fn test_java_dockerfiles() {
        let jar = java_dockerfile(&EntryPoint::Jar("target/app.jar".to_string()));
        assert!(jar.starts_with("FROM eclipse-temurin:17\n"));
        assert!(jar.contains("-javaagent:/otel/opentelemetry-javaagent.jar"));
        assert!(jar.contains(r#"CMD ["java", "-jar", "target/app.jar"]"#));

        let maven = java_dockerfile(&EntryPoint::Maven);
        assert!(maven.contains("mvn -q -DskipTests package"));

        let main = java_dockerfile(&EntryPoint::JavaMain("com.acme.Main".to_string()));
        assert!(main.contains("javac -d /app/classes"));
        assert!(main.contains(r#""com.acme.Main"]"#));
    }
}
