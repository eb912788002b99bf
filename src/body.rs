//! Request body decoding.
//!
//! The whole body is buffered, then decoded once:
//!
//! - `content-type` exactly `application/json`: strict JSON. If that fails
//!   the raw text comes back as [`Body::Text`]. The parse error is dropped.
//! - anything else: `application/x-www-form-urlencoded`, which cannot fail.
//!
//! There is no size cap here. Put one in front of the server if you need it.

use http_body_util::BodyExt;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{BoxError, Error};

const JSON: &str = "application/json";

/// A decoded request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    /// Not parsed: every non-`POST` request.
    #[default]
    None,
    Json(Value),
    Form(Form),
    /// A JSON body that failed to parse, verbatim.
    Text(String),
}

/// A decoded `key=value&…` mapping, in the order keys first appeared.
pub type Form = IndexMap<String, FormValue>;

/// One form or query-string value. A key that appears more than once
/// collects every value in arrival order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    One(String),
    Many(Vec<String>),
}

impl FormValue {
    /// The first value for the key.
    pub fn first(&self) -> &str {
        match self {
            Self::One(v) => v,
            Self::Many(vs) => vs.first().map_or("", String::as_str),
        }
    }

    /// `Some` only when the key appeared exactly once.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::One(v) => Some(v),
            Self::Many(_) => None,
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(vs) => vs.clone(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(first) => *self = Self::Many(vec![std::mem::take(first), value]),
            Self::Many(vs) => vs.push(value),
        }
    }
}

impl Body {
    pub fn is_none(&self) -> bool { matches!(self, Self::None) }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&Form> {
        match self {
            Self::Form(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The body as a JSON value: `null`, the parsed document, an object of
    /// form fields, or a string.
    pub fn to_value(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Json(v) => v.clone(),
            Self::Form(f) => f
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        FormValue::One(s) => Value::from(s.as_str()),
                        FormValue::Many(vs) => Value::from(vs.clone()),
                    };
                    (k.clone(), v)
                })
                .collect::<serde_json::Map<_, _>>()
                .into(),
            Self::Text(t) => Value::from(t.as_str()),
        }
    }

    /// Deserialize the body into `T`, whichever shape it arrived in.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

/// Buffer `body` to end-of-stream and decode it.
///
/// A failing stream is the only error: it surfaces as [`Error::Body`].
pub async fn parse<B>(content_type: Option<&str>, body: B) -> Result<Body, Error>
where
    B: hyper::body::Body,
    B::Error: Into<BoxError>,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| Error::Body(e.into()))?
        .to_bytes();
    Ok(decode(content_type, &bytes))
}

/// Decode an already-buffered body.
pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Body {
    let text = String::from_utf8_lossy(bytes);
    if content_type == Some(JSON) {
        return match serde_json::from_str(&text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(text.into_owned()),
        };
    }
    Body::Form(parse_form(text.as_bytes()))
}

/// Decode `application/x-www-form-urlencoded` input (also used for query
/// strings). `+` is a space, percent escapes are decoded, empty input is an
/// empty map.
pub fn parse_form(input: &[u8]) -> Form {
    let mut form = Form::new();
    for (key, value) in form_urlencoded::parse(input) {
        match form.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(FormValue::One(value.into_owned()));
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(value.into_owned()),
        }
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(v: &str) -> FormValue { FormValue::One(v.to_owned()) }

    #[test]
    fn json_content_type_parses_json() {
        assert_eq!(decode(Some(JSON), br#"{"a":1}"#), Body::Json(json!({"a": 1})));
    }

    #[test]
    fn malformed_json_falls_back_to_raw_text() {
        assert_eq!(decode(Some(JSON), br#"{"a":1"#), Body::Text(r#"{"a":1"#.to_owned()));
    }

    #[test]
    fn empty_json_body_is_empty_text() {
        assert_eq!(decode(Some(JSON), b""), Body::Text(String::new()));
    }

    #[test]
    fn json_with_charset_is_not_json() {
        let body = decode(Some("application/json; charset=utf-8"), br#"{"a":1}"#);
        assert!(body.as_form().is_some());
    }

    #[test]
    fn other_content_types_are_form_decoded() {
        let body = decode(Some("application/x-www-form-urlencoded"), b"a=1&b=2");
        let form = body.as_form().unwrap();
        assert_eq!(form.len(), 2);
        assert_eq!(form["a"], one("1"));
        assert_eq!(form["b"], one("2"));

        assert_eq!(decode(None, b"a=1"), Body::Form(Form::from([("a".to_owned(), one("1"))])));
    }

    #[test]
    fn empty_form_is_empty_map() {
        assert_eq!(decode(None, b""), Body::Form(Form::new()));
    }

    #[test]
    fn form_decoding_rules() {
        let form = parse_form(b"name=Ada+Lovelace&tag=a&tag=b&tag=c&flag&x=%2F%26");
        assert_eq!(form["name"], one("Ada Lovelace"));
        assert_eq!(form["tag"], FormValue::Many(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(form["flag"], one(""));
        assert_eq!(form["x"], one("/&"));
        assert_eq!(form["tag"].first(), "a");
        assert_eq!(form["tag"].as_str(), None);
    }

    #[test]
    fn keys_keep_arrival_order() {
        let form = parse_form(b"zeta=1&alpha=2&mid=3&zeta=4");
        let keys: Vec<&str> = form.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);

        assert_eq!(serde_json::to_string(&form).unwrap(), r#"{"zeta":["1","4"],"alpha":"2","mid":"3"}"#);
        assert_eq!(Body::Form(form).to_value().to_string(), r#"{"zeta":["1","4"],"alpha":"2","mid":"3"}"#);
    }

    #[test]
    fn deserializes_any_shape() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
        }

        let json = decode(Some(JSON), br#"{"name":"ada"}"#);
        assert_eq!(json.deserialize::<User>().unwrap().name, "ada");

        let form = decode(None, b"name=bob");
        assert_eq!(form.deserialize::<User>().unwrap().name, "bob");

        assert!(Body::None.deserialize::<User>().is_err());
        assert_eq!(Body::None.deserialize::<Option<String>>().unwrap(), None);
    }

    #[tokio::test]
    async fn parse_buffers_the_stream() {
        use bytes::Bytes;
        use http_body_util::Full;

        let body = parse(Some(JSON), Full::new(Bytes::from_static(b"[1,2]"))).await.unwrap();
        assert_eq!(body, Body::Json(json!([1, 2])));
    }
}
