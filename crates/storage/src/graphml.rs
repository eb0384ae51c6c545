// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GraphML codec for workfiles.
//!
//! Compatible with what networkx-style writers produce: a directed graph,
//! `<key>` declarations mapping key ids to attribute names, node and edge
//! attributes as `<data>` children, and the wrapper template as a
//! graph-level attribute. Key ids written by this codec are the attribute
//! names themselves, which other readers accept. Edge ids are read from
//! either a `<data key="id">` child or the `id` attribute on `<edge>`.

use crate::codec::{CodecError, GraphCodec};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use wf_core::{Edge, EdgeId, ExecRecord, Node, NodeId, WorkGraph};

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

const GRAPH_KEYS: [&str; 1] = ["wrapper"];
const NODE_KEYS: [&str; 10] =
    ["label", "x", "y", "status", "command", "stdout", "stderr", "pid", "error_code", "log"];
const EDGE_KEYS: [&str; 3] = ["id", "edge_type", "status"];

const EXEC_KEYS: [&str; 5] = ["command", "stdout", "stderr", "pid", "error_code"];

/// The canonical workfile codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphmlCodec;

impl GraphCodec for GraphmlCodec {
    fn decode(&self, bytes: &[u8]) -> Result<WorkGraph, CodecError> {
        decode(bytes)
    }

    fn encode(&self, graph: &WorkGraph) -> Result<Vec<u8>, CodecError> {
        encode(graph)
    }
}

#[derive(Debug)]
struct PendingNode {
    id: String,
    attrs: HashMap<String, String>,
}

#[derive(Debug)]
struct PendingEdge {
    xml_id: Option<String>,
    source: String,
    target: String,
    attrs: HashMap<String, String>,
}

#[derive(Debug)]
enum Scope {
    Graph,
    Node(PendingNode),
    Edge(PendingEdge),
}

fn decode(bytes: &[u8]) -> Result<WorkGraph, CodecError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // key id -> declared attribute name
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut graph = WorkGraph::new();
    let mut pending_edges: Vec<PendingEdge> = Vec::new();
    let mut scope = Scope::Graph;
    let mut current_data: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(el) | Event::Empty(el) if el.local_name().as_ref() == b"key" => {
                let id = required_attr(&el, "id")?;
                let name = optional_attr(&el, "attr.name")?.unwrap_or_else(|| id.clone());
                keys.insert(id, name);
            }
            Event::Start(el) if el.local_name().as_ref() == b"node" => {
                scope = Scope::Node(PendingNode {
                    id: required_attr(&el, "id")?,
                    attrs: HashMap::new(),
                });
            }
            Event::Empty(el) if el.local_name().as_ref() == b"node" => {
                let pending =
                    PendingNode { id: required_attr(&el, "id")?, attrs: HashMap::new() };
                graph.insert_node(build_node(pending)?);
            }
            Event::Start(el) if el.local_name().as_ref() == b"edge" => {
                scope = Scope::Edge(pending_edge(&el)?);
            }
            Event::Empty(el) if el.local_name().as_ref() == b"edge" => {
                pending_edges.push(pending_edge(&el)?);
            }
            Event::Start(el) if el.local_name().as_ref() == b"data" => {
                let key = required_attr(&el, "key")?;
                current_data = Some(keys.get(&key).cloned().unwrap_or(key));
                text.clear();
            }
            Event::Empty(el) if el.local_name().as_ref() == b"data" => {
                let key = required_attr(&el, "key")?;
                let name = keys.get(&key).cloned().unwrap_or(key);
                record_data(&mut scope, &mut graph, name, String::new());
            }
            Event::Text(t) => {
                if current_data.is_some() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if current_data.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(el) => match el.local_name().as_ref() {
                b"data" => {
                    if let Some(name) = current_data.take() {
                        record_data(&mut scope, &mut graph, name, std::mem::take(&mut text));
                    }
                }
                b"node" => {
                    if let Scope::Node(pending) = std::mem::replace(&mut scope, Scope::Graph) {
                        graph.insert_node(build_node(pending)?);
                    }
                }
                b"edge" => {
                    if let Scope::Edge(pending) = std::mem::replace(&mut scope, Scope::Graph) {
                        pending_edges.push(pending);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // Edges may precede their endpoints in the document, so resolve last.
    for pending in pending_edges {
        let edge = build_edge(pending, &graph)?;
        graph.insert_edge(edge);
    }
    Ok(graph)
}

fn pending_edge(el: &BytesStart<'_>) -> Result<PendingEdge, CodecError> {
    Ok(PendingEdge {
        xml_id: optional_attr(el, "id")?,
        source: required_attr(el, "source")?,
        target: required_attr(el, "target")?,
        attrs: HashMap::new(),
    })
}

fn record_data(scope: &mut Scope, graph: &mut WorkGraph, name: String, value: String) {
    match scope {
        Scope::Graph => {
            if name == "wrapper" {
                graph.wrapper = value;
            }
        }
        Scope::Node(pending) => {
            pending.attrs.insert(name, value);
        }
        Scope::Edge(pending) => {
            pending.attrs.insert(name, value);
        }
    }
}

fn build_node(pending: PendingNode) -> Result<Node, CodecError> {
    let PendingNode { id, attrs } = pending;
    let status = match attrs.get("status") {
        Some(s) => s.parse()?,
        None => Default::default(),
    };
    let exec = EXEC_KEYS.iter().any(|k| attrs.contains_key(*k)).then(|| ExecRecord {
        command: attrs.get("command").cloned().unwrap_or_default(),
        stdout: attrs.get("stdout").cloned().unwrap_or_default(),
        stderr: attrs.get("stderr").cloned().unwrap_or_default(),
        pid: attrs.get("pid").cloned().unwrap_or_default(),
        error_code: attrs.get("error_code").cloned().unwrap_or_default(),
    });
    Ok(Node {
        id: NodeId::from_string(id),
        label: attrs.get("label").cloned().unwrap_or_default(),
        x: parse_coord(attrs.get("x")),
        y: parse_coord(attrs.get("y")),
        status,
        exec,
        log: attrs.get("log").cloned(),
    })
}

fn build_edge(pending: PendingEdge, graph: &WorkGraph) -> Result<Edge, CodecError> {
    let PendingEdge { xml_id, source, target, attrs } = pending;
    let source = NodeId::from_string(source);
    let target = NodeId::from_string(target);
    if !graph.contains_node(&source) || !graph.contains_node(&target) {
        return Err(CodecError::Malformed(format!(
            "edge {} -> {} references a missing node",
            source, target
        )));
    }
    let edge_type = match attrs.get("edge_type") {
        Some(s) => s.parse()?,
        None => Default::default(),
    };
    let status = match attrs.get("status") {
        Some(s) => s.parse()?,
        None => Default::default(),
    };
    let id = attrs
        .get("id")
        .cloned()
        .or(xml_id)
        .filter(|s| !s.is_empty())
        .map(EdgeId::from_string);
    Ok(Edge { id, source, target, edge_type, status })
}

fn parse_coord(value: Option<&String>) -> f64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0.0)
}

fn required_attr(el: &BytesStart<'_>, name: &str) -> Result<String, CodecError> {
    optional_attr(el, name)?.ok_or_else(|| {
        CodecError::Malformed(format!(
            "<{}> missing required attribute {:?}",
            String::from_utf8_lossy(el.local_name().as_ref()),
            name
        ))
    })
}

fn optional_attr(el: &BytesStart<'_>, name: &str) -> Result<Option<String>, CodecError> {
    match el.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn encode(graph: &WorkGraph) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("graphml");
    root.push_attribute(("xmlns", GRAPHML_NS));
    writer.write_event(Event::Start(root))?;

    for name in GRAPH_KEYS {
        write_key(&mut writer, "graph", name)?;
    }
    for name in NODE_KEYS {
        write_key(&mut writer, "node", name)?;
    }
    for name in EDGE_KEYS {
        write_key(&mut writer, "edge", name)?;
    }

    let mut graph_el = BytesStart::new("graph");
    graph_el.push_attribute(("edgedefault", "directed"));
    writer.write_event(Event::Start(graph_el))?;

    write_data(&mut writer, "wrapper", &graph.wrapper)?;

    for node in graph.nodes() {
        let mut el = BytesStart::new("node");
        el.push_attribute(("id", node.id.as_str()));
        writer.write_event(Event::Start(el))?;
        write_data(&mut writer, "label", &node.label)?;
        write_data(&mut writer, "x", &node.x.to_string())?;
        write_data(&mut writer, "y", &node.y.to_string())?;
        write_data(&mut writer, "status", node.status.as_str())?;
        if let Some(exec) = &node.exec {
            write_data(&mut writer, "command", &exec.command)?;
            write_data(&mut writer, "stdout", &exec.stdout)?;
            write_data(&mut writer, "stderr", &exec.stderr)?;
            write_data(&mut writer, "pid", &exec.pid)?;
            write_data(&mut writer, "error_code", &exec.error_code)?;
        }
        if let Some(log) = &node.log {
            write_data(&mut writer, "log", log)?;
        }
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    for edge in graph.edges() {
        let mut el = BytesStart::new("edge");
        el.push_attribute(("source", edge.source.as_str()));
        el.push_attribute(("target", edge.target.as_str()));
        writer.write_event(Event::Start(el))?;
        if let Some(id) = &edge.id {
            write_data(&mut writer, "id", id.as_str())?;
        }
        write_data(&mut writer, "edge_type", edge.edge_type.as_str())?;
        write_data(&mut writer, "status", edge.status.as_str())?;
        writer.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;
    Ok(writer.into_inner())
}

fn write_key<W: std::io::Write>(
    writer: &mut Writer<W>,
    domain: &str,
    name: &str,
) -> Result<(), CodecError> {
    let mut el = BytesStart::new("key");
    el.push_attribute(("id", name));
    el.push_attribute(("for", domain));
    el.push_attribute(("attr.name", name));
    el.push_attribute(("attr.type", "string"));
    writer.write_event(Event::Empty(el))?;
    Ok(())
}

fn write_data<W: std::io::Write>(
    writer: &mut Writer<W>,
    key: &str,
    value: &str,
) -> Result<(), CodecError> {
    let mut el = BytesStart::new("data");
    el.push_attribute(("key", key));
    writer.write_event(Event::Start(el))?;
    if !value.is_empty() {
        writer.write_event(Event::Text(BytesText::new(value)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("data")))?;
    Ok(())
}

#[cfg(test)]
#[path = "graphml_tests.rs"]
mod tests;
