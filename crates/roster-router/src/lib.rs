//! roster-router: zero-dependency segment trie HTTP router
//!
//! One trie is shared by every method. Each terminal node keeps its own
//! method table, so a single lookup can tell apart "no such path" (404)
//! from "path exists, method does not" (405).
//!
//! Paths are static and matched strictly: `/members/` and `/members` are
//! different paths.
//!
//! ## Example
//! ```
//! use roster_router::{Lookup, Router};
//!
//! let mut router = Router::new();
//! router.insert("GET", "/members", 0);
//!
//! match router.lookup("GET", "/members") {
//!     Lookup::Found(m) => assert_eq!(m.handler_id, 0),
//!     other => panic!("unexpected {other:?}"),
//! }
//! assert_eq!(
//!     router.lookup("POST", "/members"),
//!     Lookup::MethodNotAllowed(vec!["GET".to_string(), "HEAD".to_string()])
//! );
//! assert_eq!(router.lookup("GET", "/unknown"), Lookup::NotFound);
//! ```

use std::collections::{BTreeMap, HashMap};

/// Route match result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// The matched handler ID
    pub handler_id: u32,
}

/// Outcome of routing a (method, path) pair
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A handler is registered for this method and path
    Found(Match),
    /// The path is known but not for this method. Carries the methods
    /// that are, sorted, with `HEAD` implied by `GET`.
    MethodNotAllowed(Vec<String>),
    /// Nothing is registered at this path
    NotFound,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    /// Method -> handler ID, only populated on terminal nodes
    handlers: BTreeMap<String, u32>,
}

/// Segment trie router
#[derive(Debug, Default)]
pub struct Router {
    root: Node,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route, returning the handler ID it replaced, if any.
    /// Methods are case-insensitive.
    pub fn insert(&mut self, method: &str, path: &str, handler_id: u32) -> Option<u32> {
        let node = split(path).fold(&mut self.root, |node, segment| {
            node.children.entry(segment.to_string()).or_default()
        });
        node.handlers.insert(method.to_uppercase(), handler_id)
    }

    /// Route a request.
    ///
    /// `HEAD` falls back to the `GET` handler when no explicit `HEAD`
    /// route exists.
    pub fn lookup(&self, method: &str, path: &str) -> Lookup {
        let Some(node) = self.find_node(path) else {
            return Lookup::NotFound;
        };

        let method = method.to_uppercase();
        let handler = node.handlers.get(&method).or_else(|| {
            if method == "HEAD" {
                node.handlers.get("GET")
            } else {
                None
            }
        });

        match handler {
            Some(&handler_id) => Lookup::Found(Match { handler_id }),
            None => Lookup::MethodNotAllowed(Self::methods_of(node)),
        }
    }

    fn methods_of(node: &Node) -> Vec<String> {
        let mut methods: Vec<String> = node.handlers.keys().cloned().collect();
        if node.handlers.contains_key("GET") && !node.handlers.contains_key("HEAD") {
            methods.push("HEAD".to_string());
            methods.sort();
        }
        methods
    }

    fn find_node(&self, path: &str) -> Option<&Node> {
        split(path)
            .try_fold(&self.root, |node, segment| node.children.get(segment))
            .filter(|node| !node.handlers.is_empty())
    }
}

/// Split a path into segments. The root path has none; every other
/// slash-separated piece is kept, including empty ones.
fn split(path: &str) -> impl Iterator<Item = &str> + '_ {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}
