use crate::describe::trim::trim_to_boundary;
use crate::describe::{additions, resolver, DescriptionGenerator, DescriptionType, RenderMemo};
use crate::errors::SubjectError;
use crate::health;
use crate::site::model::ContentSubject;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SERVER_NAME: &str = "seo-description-mcp";

// Global switch: once we detect raw JSON (no Content-Length) from the client,
// we reply in ND-JSON (one JSON per line, no headers).
static RAW_JSON_MODE: AtomicBool = AtomicBool::new(false);

pub struct StdioMcpServer {
    generator: Arc<DescriptionGenerator>,
    site_file: Option<PathBuf>,
}

impl StdioMcpServer {
    pub fn new(generator: Arc<DescriptionGenerator>, site_file: Option<PathBuf>) -> Self {
        Self {
            generator,
            site_file,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut reader = std::io::BufReader::new(stdin.lock());
        let mut writer = std::io::BufWriter::new(stdout.lock());
        tracing::info!("run loop started: waiting for framed MCP requests on stdin");
        loop {
            let msg = match read_framed_message_buf(&mut reader) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(error=?e, "stdin closed or invalid frame");
                    break;
                }
            };
            let req: serde_json::Value = match serde_json::from_slice(&msg) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error=?e, "invalid JSON");
                    continue;
                }
            };

            let method = req.get("method").and_then(|m| m.as_str()).unwrap_or("");
            let id_opt = req.get("id").cloned();
            let id_reply = id_opt.as_ref().filter(|v| !v.is_null()).cloned();
            tracing::info!(%method, id=?id_opt, "received request");
            match method {
                "initialize" => {
                    let params = req.get("params").cloned().unwrap_or(json!({}));
                    let client_proto = params
                        .get("protocolVersion")
                        .and_then(|x| x.as_str())
                        .unwrap_or("2024-11-05");
                    let result = json!({
                        "protocolVersion": client_proto,
                        "capabilities": {
                            "tools": {"list": true, "call": true},
                            "prompts": {"list": true},
                            "resources": {"list": true, "read": true, "subscribe": false}
                        },
                        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
                    });
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, result)?;
                    }
                }
                "server/info" => {
                    let info = json!({"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")});
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, json!({"serverInfo": info}))?;
                    }
                }
                "tools/list" => {
                    let tools = list_tools_schema();
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, json!({"tools": tools}))?;
                    }
                }
                "prompts/list" => {
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, json!({"prompts": []}))?;
                    }
                }
                "resources/list" => {
                    let resources = vec![
                        json!({
                            "uri": "mcp://seo-description/options",
                            "name": "Description options",
                            "description": "Generation switches, separator and per-surface length budgets",
                            "mimeType": "application/json"
                        }),
                        json!({
                            "uri": "mcp://seo-description/metrics",
                            "name": "Server metrics snapshot",
                            "description": "Counters for generated, custom and empty descriptions",
                            "mimeType": "application/json"
                        }),
                    ];
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, json!({"resources": resources}))?;
                    }
                }
                "resources/read" => {
                    let params = req.get("params").cloned().unwrap_or(json!({}));
                    let uri = params.get("uri").and_then(|x| x.as_str()).unwrap_or("");
                    let text = match uri {
                        "mcp://seo-description/options" => {
                            serde_json::to_string_pretty(self.generator.options())
                                .unwrap_or_else(|_| "{}".into())
                        }
                        "mcp://seo-description/metrics" => {
                            serde_json::to_string_pretty(&self.generator.metrics_snapshot())
                                .unwrap_or_else(|_| "{}".into())
                        }
                        _ => {
                            if let Some(id) = id_reply.clone() {
                                write_error(&mut writer, id, -32602, "Unknown resource uri")?;
                            }
                            continue;
                        }
                    };
                    let contents = vec![json!({
                        "uri": uri,
                        "mimeType": "application/json",
                        "text": text
                    })];
                    if let Some(id) = id_reply.clone() {
                        write_response(&mut writer, id, json!({"contents": contents}))?;
                    }
                }
                "tools/call" => {
                    let params = req.get("params").cloned().unwrap_or(json!({}));
                    let name = params.get("name").and_then(|x| x.as_str()).unwrap_or("");
                    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                    let result = self.dispatch_tool(name, arguments).await;
                    match result {
                        Ok(v) => {
                            if let Some(id) = id_reply.clone() {
                                write_response(
                                    &mut writer,
                                    id,
                                    json!({"content": [{"type":"json","json": v}], "isError": false}),
                                )?;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(tool=%name, error=%e, "tool call failed");
                            if let Some(id) = id_reply.clone() {
                                write_error(&mut writer, id, -32001, &format!("{}", e))?;
                            }
                        }
                    }
                }
                _ => {
                    // Do not respond to notifications (no id)
                    if let Some(id) = id_reply.clone() {
                        write_error(&mut writer, id, -32601, "method not found")?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn dispatch_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        // One memo per call: the three surfaces of a subject share one excerpt lookup.
        let mut memo = RenderMemo::new();
        match name {
            "get_description" => {
                let p: GetDescription = serde_json::from_value(arguments)?;
                let subject = parse_subject(p.subject)?;
                let ty = DescriptionType::from_name(p.r#type.as_deref().unwrap_or("search"));
                let description =
                    self.generator
                        .get_description(&mut memo, &subject, ty, p.escape.unwrap_or(true));
                Ok(json!({
                    "subject": subject,
                    "type": ty,
                    "description": description
                }))
            }
            "get_all_descriptions" => {
                let p: GetAllDescriptions = serde_json::from_value(arguments)?;
                let subject = parse_subject(p.subject)?;
                let all = self
                    .generator
                    .get_all(&mut memo, &subject, p.escape.unwrap_or(true));
                Ok(serde_json::to_value(all)?)
            }
            "resolve_excerpt" => {
                let p: SubjectOnly = serde_json::from_value(arguments)?;
                let subject = parse_subject(p.subject)?;
                let excerpt = resolver::resolve_excerpt(self.generator.source(), &subject);
                Ok(json!({"excerpt": excerpt}))
            }
            "compose_additions" => {
                let p: ComposeAdditions = serde_json::from_value(arguments)?;
                let subject = parse_subject(p.subject)?;
                let options = self.generator.options();
                let text = additions::compose_additions(
                    self.generator.source(),
                    &subject,
                    p.enabled.unwrap_or(options.additions),
                    p.use_sitename.unwrap_or(options.additions_sitename),
                    &options.connector,
                );
                Ok(json!({"additions": text}))
            }
            "trim_excerpt" => {
                let p: TrimExcerpt = serde_json::from_value(arguments)?;
                // Negative budgets mean no room at all.
                let max_chars = usize::try_from(p.max_chars).unwrap_or(0);
                let excerpt = trim_to_boundary(&p.text, max_chars);
                Ok(json!({"excerpt": excerpt, "chars": excerpt.chars().count()}))
            }
            "metrics" => {
                let snap = self.generator.metrics_snapshot();
                Ok(serde_json::to_value(snap)?)
            }
            "health_check" => {
                let site_file_ok = health::check_site_file(self.site_file.as_deref());
                let identity_ok = health::check_site_identity(self.generator.source());
                Ok(json!({
                    "site_file_ok": site_file_ok,
                    "site_identity_ok": identity_ok,
                    "server": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
                }))
            }
            _ => anyhow::bail!("unknown tool: {name}"),
        }
    }
}

fn parse_subject(raw: Option<serde_json::Value>) -> Result<ContentSubject, SubjectError> {
    let raw = raw.ok_or(SubjectError::Missing)?;
    serde_json::from_value(raw).map_err(|e| SubjectError::Invalid(e.to_string()))
}

fn list_tools_schema() -> Vec<serde_json::Value> {
    let subject = json!({"type":"object","required":["kind"],"properties":{
        "kind": {"type":"string","enum":["front_page","blog_index","singular","term","post_type_archive","author"]},
        "id": {"type":"number"},
        "taxonomy": {"type":"string"},
        "post_type": {"type":"string"}
    }});
    let types: Vec<&str> = DescriptionType::ALL.iter().map(|t| t.as_str()).collect();
    vec![
        json!({"name":"get_description","description":"Meta description for a subject: custom field first, generated otherwise","inputSchema":{"type":"object","required":["subject"],"properties":{
            "subject": subject.clone(),
            "type": {"type":"string","enum": types},
            "escape": {"type":"boolean"}
        }}}),
        json!({"name":"get_all_descriptions","description":"Search, Open Graph and Twitter descriptions for a subject","inputSchema":{"type":"object","required":["subject"],"properties":{
            "subject": subject.clone(),
            "escape": {"type":"boolean"}
        }}}),
        json!({"name":"resolve_excerpt","description":"Raw plain-text excerpt a description would be derived from","inputSchema":{"type":"object","required":["subject"],"properties":{
            "subject": subject.clone()
        }}}),
        json!({"name":"compose_additions","description":"\"Title on Sitename\" additions for a subject","inputSchema":{"type":"object","required":["subject"],"properties":{
            "subject": subject,
            "enabled": {"type":"boolean"},
            "use_sitename": {"type":"boolean"}
        }}}),
        json!({"name":"trim_excerpt","description":"Trim text to a character budget at a word or sentence boundary","inputSchema":{"type":"object","required":["text","max_chars"],"properties":{
            "text": {"type":"string"},
            "max_chars": {"type":"number"}
        }}}),
        json!({"name":"metrics","description":"Return description generation counters","inputSchema": {"type":"object","properties":{}}}),
        json!({"name":"health_check","description":"Check the site file and site identity","inputSchema": {"type":"object","properties":{}}}),
    ]
}

fn read_framed_message_buf<R: std::io::BufRead>(bufreader: &mut R) -> anyhow::Result<Vec<u8>> {
    let mut header = String::new();
    let mut content_length: Option<usize> = None;
    let mut header_lines: usize = 0;
    loop {
        header.clear();
        let n = bufreader.read_line(&mut header)?;
        if n == 0 {
            anyhow::bail!("eof");
        }
        let line = header.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        header_lines += 1;
        tracing::trace!(%line, "framing header line");
        // Fallback for clients that send newline-delimited raw JSON instead of framed headers
        if header_lines == 1 && line.starts_with('{') && line.contains("\"jsonrpc\"") {
            tracing::debug!("detected raw JSON line without Content-Length; accepting as body");
            RAW_JSON_MODE.store(true, Ordering::Relaxed);
            return Ok(line.as_bytes().to_vec());
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                let v = value.trim();
                content_length = Some(v.parse::<usize>()?);
            }
            // ignore other headers (e.g., Content-Type)
        }
    }
    let len = content_length.ok_or_else(|| anyhow::anyhow!("missing Content-Length"))?;
    let mut body = vec![0u8; len];
    bufreader.read_exact(&mut body)?;
    tracing::trace!(header_lines, content_length = len, "framed message parsed");
    Ok(body)
}

fn write_response<W: Write>(
    writer: &mut W,
    id: serde_json::Value,
    result: serde_json::Value,
) -> anyhow::Result<()> {
    let resp = json!({"jsonrpc":"2.0","id": id, "result": result});
    write_framed(writer, &resp)
}

fn write_error<W: Write>(
    writer: &mut W,
    id: serde_json::Value,
    code: i64,
    message: &str,
) -> anyhow::Result<()> {
    let resp = json!({"jsonrpc":"2.0","id": id, "error": {"code": code, "message": message}});
    write_framed(writer, &resp)
}

fn write_framed<W: Write>(writer: &mut W, v: &serde_json::Value) -> anyhow::Result<()> {
    let s = serde_json::to_string(v)?;
    // Respond in ND-JSON mode if detected (or forced), otherwise use Content-Length framing.
    let force_ndjson = std::env::var("MCP_FORCE_NDJSON").ok().as_deref() == Some("1");
    if force_ndjson || RAW_JSON_MODE.load(Ordering::Relaxed) {
        writeln!(writer, "{}", s)?;
    } else {
        write!(writer, "Content-Length: {}\r\n\r\n{}", s.len(), s)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::DescriptionOptions;
    use crate::site::store::SiteStore;

    fn server() -> StdioMcpServer {
        let store = SiteStore::from_json(
            r#"{
            "site": {"name": "Acme", "tagline": "Tools for makers"},
            "posts": [
                {"id": 3, "title": "Chisels", "content": "A sharp chisel is a safe chisel."},
                {"id": 4, "title": "Locked", "password": "pw", "content": "Secret body."}
            ],
            "terms": [{"id": 7, "taxonomy": "category", "name": "Tools", "description": "Hand tools & more."}]
        }"#,
        )
        .expect("fixture");
        let generator = DescriptionGenerator::new(Arc::new(store), DescriptionOptions::default());
        StdioMcpServer::new(Arc::new(generator), None)
    }

    #[test]
    fn framed_write_and_read_roundtrip() {
        let v = serde_json::json!({"jsonrpc":"2.0","id":1,"result":{"ok":true}});
        let mut out = Vec::new();
        write_framed(&mut out, &v).expect("write");
        let mut cursor = std::io::Cursor::new(out);
        let mut bufreader = std::io::BufReader::new(&mut cursor);
        let body = read_framed_message_buf(&mut bufreader).expect("read");
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, v);
    }

    #[tokio::test]
    async fn dispatch_get_description_escapes_by_default() {
        let server = server();
        let res = server
            .dispatch_tool(
                "get_description",
                serde_json::json!({"subject": {"kind":"term","id":7,"taxonomy":"category"}}),
            )
            .await
            .unwrap();
        assert_eq!(res.get("type").and_then(|x| x.as_str()), Some("search"));
        assert_eq!(
            res.get("description").and_then(|x| x.as_str()),
            Some("Tools on Acme | Hand tools &amp; more.")
        );
    }

    #[tokio::test]
    async fn dispatch_all_descriptions_and_protected_excerpt() {
        let server = server();
        let all = server
            .dispatch_tool(
                "get_all_descriptions",
                serde_json::json!({"subject": {"kind":"singular","id":3}, "escape": false}),
            )
            .await
            .unwrap();
        for key in ["search", "opengraph", "twitter"] {
            assert_eq!(
                all.get(key).and_then(|x| x.as_str()),
                Some("Chisels on Acme | A sharp chisel is a safe chisel.")
            );
        }

        let excerpt = server
            .dispatch_tool(
                "resolve_excerpt",
                serde_json::json!({"subject": {"kind":"singular","id":4}}),
            )
            .await
            .unwrap();
        assert_eq!(excerpt.get("excerpt").and_then(|x| x.as_str()), Some(""));
    }

    #[tokio::test]
    async fn dispatch_additions_and_trim() {
        let server = server();
        let res = server
            .dispatch_tool(
                "compose_additions",
                serde_json::json!({"subject": {"kind":"front_page"}, "enabled": false, "use_sitename": true}),
            )
            .await
            .unwrap();
        assert_eq!(res.get("additions").and_then(|x| x.as_str()), Some(""));

        let res = server
            .dispatch_tool(
                "trim_excerpt",
                serde_json::json!({"text": "Hello world. This is great.", "max_chars": 11}),
            )
            .await
            .unwrap();
        assert_eq!(res.get("excerpt").and_then(|x| x.as_str()), Some("Hello world."));
        assert_eq!(res.get("chars").and_then(|x| x.as_u64()), Some(12));

        for max_chars in [0, -5] {
            let res = server
                .dispatch_tool(
                    "trim_excerpt",
                    serde_json::json!({"text": "Hello world.", "max_chars": max_chars}),
                )
                .await
                .unwrap();
            assert_eq!(res.get("excerpt").and_then(|x| x.as_str()), Some(""));
            assert_eq!(res.get("chars").and_then(|x| x.as_u64()), Some(0));
        }
    }

    #[tokio::test]
    async fn dispatch_rejects_bad_subjects_and_unknown_tools() {
        let server = server();
        let err = server
            .dispatch_tool("get_description", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing subject"));
        let err = server
            .dispatch_tool(
                "get_description",
                serde_json::json!({"subject": {"kind":"galaxy"}}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid subject"));
        assert!(server
            .dispatch_tool("nope", serde_json::json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn dispatch_metrics_and_health() {
        let server = server();
        let _ = server
            .dispatch_tool(
                "get_description",
                serde_json::json!({"subject": {"kind":"singular","id":3}}),
            )
            .await
            .unwrap();
        let metrics = server
            .dispatch_tool("metrics", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(metrics.get("generated_count").and_then(|x| x.as_u64()), Some(1));
        let health = server
            .dispatch_tool("health_check", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(health.get("site_file_ok").and_then(|x| x.as_bool()), Some(false));
        assert_eq!(health.get("site_identity_ok").and_then(|x| x.as_bool()), Some(true));
    }
}

// Wire structs for tool params
#[derive(Debug, Deserialize)]
struct GetDescription {
    subject: Option<serde_json::Value>,
    r#type: Option<String>,
    escape: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GetAllDescriptions {
    subject: Option<serde_json::Value>,
    escape: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SubjectOnly {
    subject: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ComposeAdditions {
    subject: Option<serde_json::Value>,
    enabled: Option<bool>,
    use_sitename: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TrimExcerpt {
    text: String,
    max_chars: i64,
}
