//! 请求构造
//! URL 拼接、请求体序列化、请求头合并（含 Bearer 凭证）

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 形如 "scheme://" 的绝对 URL 前缀
static ABSOLUTE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("absolute url pattern is valid")
});

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "content-type";
pub const REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// multipart 表单字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// 预构建的 multipart 表单（纯数据，重试时可原样重放）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartPayload {
    pub parts: Vec<MultipartPart>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(MultipartPayload),
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartPayload> for RequestBody {
    fn from(payload: MultipartPayload) -> Self {
        RequestBody::Multipart(payload)
    }
}

/// 凭证来源
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BearerSource {
    /// 使用存储中的访问令牌
    #[default]
    Stored,
    /// 显式指定令牌（刷新后的重试改用新令牌）
    Explicit(String),
    /// 不携带凭证
    Anonymous,
}

/// 调用方的请求选项
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub bearer: BearerSource,
    /// 401 时是否进入刷新重试流程
    pub session_recovery: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            headers: Vec::new(),
            body: None,
            bearer: BearerSource::Stored,
            session_recovery: true,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn multipart(mut self, payload: MultipartPayload) -> Self {
        self.body = Some(RequestBody::Multipart(payload));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = BearerSource::Explicit(token.into());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.bearer = BearerSource::Anonymous;
        self
    }

    pub fn without_session_recovery(mut self) -> Self {
        self.session_recovery = false;
        self
    }
}

/// 完整的请求描述（可序列化，传输层直接消费）
///
/// 请求头名称统一小写。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 请求实际携带的 Bearer 令牌
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// 以新令牌重放同一请求
    pub fn with_bearer(&self, token: &str) -> RequestDescriptor {
        let mut replay = self.clone();
        replay
            .headers
            .insert(AUTHORIZATION.to_string(), format!("Bearer {}", token));
        replay
    }

    /// JSON 请求体的字节形式
    pub fn json_bytes(&self) -> Option<Vec<u8>> {
        match &self.body {
            Some(RequestBody::Json(value)) => Some(value.to_string().into_bytes()),
            _ => None,
        }
    }
}

/// 请求构造器（无副作用）
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
}

impl RequestBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 解析目标 URL：绝对 URL 原样使用，否则与 base 以恰好一个 "/" 拼接
    pub fn build_url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        if is_absolute_url(path) {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// 构造请求描述
    pub fn build(&self, path: &str, options: &RequestOptions, token: Option<&str>) -> RequestDescriptor {
        let mut headers: BTreeMap<String, String> = options
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        if matches!(options.body, Some(RequestBody::Json(_))) && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE.to_string(), "application/json".to_string());
        }

        if let Some(token) = token {
            headers.insert(AUTHORIZATION.to_string(), format!("Bearer {}", token));
        }

        RequestDescriptor {
            method: options.method,
            url: self.build_url(path),
            headers,
            body: options.body.clone(),
        }
    }
}

pub fn is_absolute_url(path: &str) -> bool {
    ABSOLUTE_URL.is_match(path)
}

/// 将查询参数追加到路径（参数为空时路径不变）
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}{}", path, separator, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_conversions() {
        let body: RequestBody = json!({ "title": "Heat" }).into();
        assert_eq!(body, RequestBody::Json(json!({ "title": "Heat" })));

        let payload = MultipartPayload::new().text("movie_id", "7");
        let body: RequestBody = payload.clone().into();
        assert_eq!(body, RequestBody::Multipart(payload));
    }

    #[test]
    fn test_build_url_joins_with_single_slash() {
        assert_eq!(RequestBuilder::new("/api").build_url("movies"), "/api/movies");
        assert_eq!(RequestBuilder::new("/api/").build_url("/movies"), "/api/movies");
        assert_eq!(RequestBuilder::new("/api").build_url("/movies"), "/api/movies");
        assert_eq!(RequestBuilder::new("/api/").build_url("movies"), "/api/movies");
    }

    #[test]
    fn test_build_url_absolute_verbatim() {
        let builder = RequestBuilder::new("/api");
        assert_eq!(builder.build_url("http://x/y"), "http://x/y");
        assert_eq!(builder.build_url("https://x/y?z=1"), "https://x/y?z=1");
    }

    #[test]
    fn test_build_url_empty_path_is_base() {
        assert_eq!(RequestBuilder::new("/api").build_url(""), "/api");
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let builder = RequestBuilder::new("/api");
        let options = RequestOptions::new(Method::Post).json(json!({ "title": "Heat" }));

        let request = builder.build("movies", &options, None);
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.json_bytes().unwrap(), br#"{"title":"Heat"}"#.to_vec());
    }

    #[test]
    fn test_caller_content_type_preserved() {
        let builder = RequestBuilder::new("/api");
        let options = RequestOptions::new(Method::Post)
            .header("Content-Type", "application/merge-patch+json")
            .json(json!({}));

        let request = builder.build("movies/1", &options, None);
        assert_eq!(request.header(CONTENT_TYPE), Some("application/merge-patch+json"));
    }

    #[test]
    fn test_multipart_has_no_json_content_type() {
        let builder = RequestBuilder::new("/api");
        let payload = MultipartPayload::new().file("poster", "heat.png", Some("image/png"), vec![1, 2, 3]);
        let options = RequestOptions::new(Method::Post).multipart(payload);

        let request = builder.build("images", &options, None);
        assert!(request.header(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_bearer_attached_only_with_token() {
        let builder = RequestBuilder::new("/api");
        let options = RequestOptions::default();

        let request = builder.build("movies", &options, Some("A"));
        assert_eq!(request.header("Authorization"), Some("Bearer A"));
        assert_eq!(request.bearer_token(), Some("A"));

        let request = builder.build("movies", &options, None);
        assert!(request.header(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_with_bearer_replays_everything_else() {
        let builder = RequestBuilder::new("/api");
        let options = RequestOptions::new(Method::Post)
            .header("X-Trace", "t1")
            .json(json!({ "title": "Heat" }));
        let original = builder.build("movies", &options, Some("A"));

        let replay = original.with_bearer("A2");
        assert_eq!(replay.bearer_token(), Some("A2"));
        assert_eq!(replay.url, original.url);
        assert_eq!(replay.body, original.body);
        assert_eq!(replay.header("x-trace"), Some("t1"));
        assert_eq!(original.bearer_token(), Some("A"));
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/movies", &[]), "/movies");
        assert_eq!(
            with_query("/movies", &[("page", "1"), ("q", "a b")]),
            "/movies?page=1&q=a+b"
        );
        assert_eq!(with_query("/movies?x=1", &[("y", "2")]), "/movies?x=1&y=2");
    }

    #[test]
    fn test_descriptor_serializable() {
        let builder = RequestBuilder::new("/api");
        let options = RequestOptions::new(Method::Put).json(json!({ "id": 7 }));
        let request = builder.build("movies/7", &options, Some("A"));

        let raw = serde_json::to_string(&request).unwrap();
        let replay: RequestDescriptor = serde_json::from_str(&raw).unwrap();
        assert_eq!(replay, request);
    }
}
