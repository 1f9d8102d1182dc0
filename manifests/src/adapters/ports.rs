use std::collections::HashSet;

use log::debug;
use otel_defs::PortSpec;

use crate::config_doc::{ConfigDocument, ConfigNode, NodeMap};
use crate::naming;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerPort {
    pub name: String,
    pub port: i32,
    /// `None` renders as the cluster default, TCP.
    pub protocol: Option<String>,
}

impl ContainerPort {
    /// Protocol as rendered. Always explicit so the live object, where the
    /// server fills the default in, compares equal to the desired one.
    pub fn protocol_or_default(&self) -> &str {
        self.protocol.as_deref().unwrap_or("TCP")
    }

    fn new(name: &str, port: i32, protocol: Option<&str>) -> Self {
        Self {
            name: naming::port_name(name, port),
            port,
            protocol: protocol.map(str::to_string),
        }
    }
}

const UDP: Option<&str> = Some("UDP");

// Well known listeners of receivers configured through `protocols:`.
fn protocol_default(receiver_type: &str, protocol: &str) -> Option<(i32, Option<&'static str>)> {
    match (receiver_type, protocol) {
        ("otlp", "grpc") => Some((4317, None)),
        ("otlp", "http") => Some((4318, None)),
        ("jaeger", "grpc") => Some((14250, None)),
        ("jaeger", "thrift_http") => Some((14268, None)),
        ("jaeger", "thrift_compact") => Some((6831, UDP)),
        ("jaeger", "thrift_binary") => Some((6832, UDP)),
        _ => None,
    }
}

// Receivers that listen on a single well known port when no endpoint is set.
fn single_port_default(receiver_type: &str) -> Option<(i32, Option<&'static str>)> {
    match receiver_type {
        "zipkin" => Some((9411, None)),
        "statsd" => Some((8125, UDP)),
        "carbon" => Some((2003, None)),
        _ => None,
    }
}

fn receiver_type(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

/// Port of a `host:port` endpoint. Missing or unparsable ports yield `None`.
fn endpoint_port(endpoint: &str) -> Option<i32> {
    let (_, port) = endpoint.rsplit_once(':')?;
    port.parse::<i32>().ok().filter(|p| *p > 0 && *p <= 65535)
}

fn endpoint_of(node: &ConfigNode) -> Option<&str> {
    node.as_map()
        .and_then(|m| m.get("endpoint"))
        .and_then(ConfigNode::as_str)
}

fn ports_of_receiver(name: &str, node: &ConfigNode) -> Vec<ContainerPort> {
    let kind = receiver_type(name);

    if let Some(endpoint) = endpoint_of(node) {
        return match endpoint_port(endpoint) {
            Some(port) => {
                let protocol = single_port_default(kind).and_then(|(_, proto)| proto);
                vec![ContainerPort::new(name, port, protocol)]
            }
            None => {
                debug!("receiver '{}' has no usable port in endpoint '{}'", name, endpoint);
                Vec::new()
            }
        };
    }

    if let Some(protocols) = node
        .as_map()
        .and_then(|m| m.get("protocols"))
        .and_then(ConfigNode::as_map)
    {
        return ports_of_protocols(name, kind, protocols);
    }

    match single_port_default(kind) {
        Some((port, protocol)) => vec![ContainerPort::new(name, port, protocol)],
        None => Vec::new(),
    }
}

fn ports_of_protocols(name: &str, kind: &str, protocols: &NodeMap) -> Vec<ContainerPort> {
    let mut ports = Vec::new();
    for (protocol, settings) in protocols {
        let default = protocol_default(kind, protocol);
        let port = endpoint_of(settings)
            .and_then(endpoint_port)
            .or(default.map(|(port, _)| port));
        match port {
            Some(port) => {
                let transport = default.and_then(|(_, transport)| transport);
                ports.push(ContainerPort::new(
                    &format!("{}-{}", name, protocol),
                    port,
                    transport,
                ));
            }
            None => debug!("no port known for protocol '{}' of receiver '{}'", protocol, name),
        }
    }
    ports
}

/// Listeners declared under `receivers:`, in configuration order.
pub fn receiver_ports(doc: &ConfigDocument) -> Vec<ContainerPort> {
    let receivers = match doc.map_at(&["receivers"]) {
        Ok(receivers) => receivers,
        Err(reason) => {
            debug!("no receiver ports derived: {}", reason);
            return Vec::new();
        }
    };
    receivers
        .iter()
        .flat_map(|(name, node)| ports_of_receiver(name, node))
        .collect()
}

/// Receiver ports plus `extra`, without duplicate names or numbers, sorted by name.
pub fn collector_ports(doc: &ConfigDocument, extra: &[PortSpec]) -> Vec<ContainerPort> {
    let candidates = receiver_ports(doc).into_iter().chain(extra.iter().map(|p| ContainerPort {
        name: naming::port_name(&p.name, p.port),
        port: p.port,
        protocol: p.protocol.clone(),
    }));

    let mut names = HashSet::new();
    let mut numbers = HashSet::new();
    let mut ports: Vec<ContainerPort> = Vec::new();
    for port in candidates {
        if names.contains(&port.name) || numbers.contains(&port.port) {
            debug!("dropping duplicate port {} ({})", port.name, port.port);
            continue;
        }
        names.insert(port.name.clone());
        numbers.insert(port.port);
        ports.push(port);
    }
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}
