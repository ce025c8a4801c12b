//! URL rewriting interceptors: path parameters and query strings.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::{Client, Reply, Request, Result, to_query_string};

const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// Replaces `:name` path segments with values.
///
/// `https://api.example.com/users/:id/posts` with `id = 42` becomes
/// `https://api.example.com/users/42/posts`. Values are percent-encoded as
/// a single segment; placeholders without a value stay as they are.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    params: HashMap<String, String>,
}

impl PathParams {
    /// No parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    fn rewrite(&self, path: &str) -> String {
        path.split('/')
            .map(|segment| {
                segment
                    .strip_prefix(':')
                    .and_then(|name| self.params.get(name))
                    .map_or_else(
                        || segment.to_owned(),
                        |value| utf8_percent_encode(value, PATH_SEGMENT_ENCODE_SET).to_string(),
                    )
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |params, (name, value)| params.param(name, value))
    }
}

impl Interceptor for PathParams {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        let path = self.rewrite(request.url().path());
        request.url_mut().set_path(&path);
        next.run(client, request)
    }
}

/// Appends query parameters, keeping the existing query string.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// No parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `name=value` pair; repeat the name for multiple values.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((name.into(), value.to_string()));
        self
    }

    /// Append every field of a serializable value.
    ///
    /// Sequences produce repeated parameters (`?tag=a&tag=b`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QuerySerialization`] if the value is not a
    /// flat struct or map.
    pub fn from_value<T: serde::Serialize>(value: &T) -> Result<Self> {
        let query = to_query_string(value)?;
        let pairs = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Ok(Self { pairs })
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |params, (name, value)| params.param(name, value))
    }
}

impl Interceptor for QueryParams {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        if !self.pairs.is_empty() {
            request.url_mut().query_pairs_mut().extend_pairs(&self.pairs);
        }
        next.run(client, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_params_replace_whole_segments() {
        let params = PathParams::new().param("id", 42).param("slug", "a b/c");
        assert_eq!(
            params.rewrite("/users/:id/posts/:slug"),
            "/users/42/posts/a%20b%2Fc"
        );
    }

    #[test]
    fn path_params_leave_unknown_placeholders() {
        let params: PathParams = [("id", "1")].into_iter().collect();
        assert_eq!(params.rewrite("/a/:idx/:id"), "/a/:idx/1");
    }

    #[test]
    fn query_params_from_value() {
        #[derive(serde::Serialize)]
        struct Search {
            q: &'static str,
            tag: Vec<&'static str>,
        }
        let params = QueryParams::from_value(&Search {
            q: "rust",
            tag: vec!["http", "client"],
        })
        .expect("serialize");
        assert_eq!(
            params.pairs,
            [
                ("q".to_owned(), "rust".to_owned()),
                ("tag".to_owned(), "http".to_owned()),
                ("tag".to_owned(), "client".to_owned()),
            ]
        );
    }
}
