//! Static handler registry.
//!
//! Controllers are registered once at startup with a factory and a table of
//! actions and their declared arity. Per-request lookups only read this
//! table; nothing is loaded by name at runtime.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dispatch::error::HandlerError;
use crate::dispatch::request::DispatchRequest;
use crate::dispatch::sink::{HandlerOutput, ResponseSink};

/// Future returned by [`Controller::call`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;

/// Declared parameter counts of an action. `required <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub total: usize,
}

impl Arity {
    /// `total` is raised to `required` if given smaller.
    pub const fn new(required: usize, total: usize) -> Self {
        let total = if total < required { required } else { total };
        Self { required, total }
    }

    pub const fn exact(n: usize) -> Self {
        Self::new(n, n)
    }

    pub const fn none() -> Self {
        Self::exact(0)
    }

    pub fn accepts(&self, supplied: usize) -> bool {
        self.required <= supplied && supplied <= self.total
    }
}

/// Everything an action can see and write.
pub struct ActionContext {
    request: Arc<DispatchRequest>,
    params: Vec<String>,
    sink: ResponseSink,
}

impl ActionContext {
    pub fn new(request: Arc<DispatchRequest>, params: Vec<String>, sink: ResponseSink) -> Self {
        Self {
            request,
            params,
            sink,
        }
    }

    pub fn request(&self) -> &DispatchRequest {
        &self.request
    }

    /// Positional parameters, already arity-checked.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn sink(&mut self) -> &mut ResponseSink {
        &mut self.sink
    }

    pub fn into_output(self) -> HandlerOutput {
        self.sink.finish()
    }
}

/// An instantiated controller able to run its actions.
///
/// `action` is always lower-case and always one the controller declared at
/// registration.
pub trait Controller: Send + Sync {
    fn call<'a>(&'a self, action: &'a str, ctx: &'a mut ActionContext) -> ActionFuture<'a>;
}

type Factory = Arc<dyn Fn(&DispatchRequest) -> Box<dyn Controller> + Send + Sync>;

/// A registered controller: its name, action table and factory.
#[derive(Clone)]
pub struct ControllerEntry {
    name: String,
    actions: HashMap<String, Arity>,
    factory: Factory,
}

impl ControllerEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared arity of `action` (case-insensitive).
    pub fn arity(&self, action: &str) -> Option<Arity> {
        self.actions.get(&action.to_lowercase()).copied()
    }

    /// Action table: lower-cased name → arity.
    pub fn actions(&self) -> &HashMap<String, Arity> {
        &self.actions
    }

    pub fn instantiate(&self, request: &DispatchRequest) -> Box<dyn Controller> {
        (self.factory)(request)
    }
}

impl fmt::Debug for ControllerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerEntry")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Controller name → entry. Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    controllers: HashMap<String, ControllerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller. A later registration under the same name
    /// replaces the earlier one.
    pub fn register<F, C>(&mut self, name: &str, actions: &[(&str, Arity)], factory: F) -> &mut Self
    where
        F: Fn(&DispatchRequest) -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        let entry = ControllerEntry {
            name: name.to_string(),
            actions: actions
                .iter()
                .map(|(action, arity)| (action.to_lowercase(), *arity))
                .collect(),
            factory: Arc::new(move |req: &DispatchRequest| -> Box<dyn Controller> {
                Box::new(factory(req))
            }),
        };
        if self.controllers.insert(name.to_lowercase(), entry).is_some() {
            tracing::warn!(controller = name, "Controller registered twice, keeping the last");
        }
        self
    }

    pub fn lookup(&self, controller: &str) -> Option<&ControllerEntry> {
        self.controllers.get(&controller.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controllers.values().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Controller for Echo {
        fn call<'a>(&'a self, action: &'a str, ctx: &'a mut ActionContext) -> ActionFuture<'a> {
            Box::pin(async move {
                let params = ctx.params().join(",");
                ctx.sink().write_str(&format!("{}:{}", action, params));
                Ok(())
            })
        }
    }

    #[test]
    fn arity_bounds() {
        let arity = Arity::new(1, 2);
        assert!(!arity.accepts(0));
        assert!(arity.accepts(1));
        assert!(arity.accepts(2));
        assert!(!arity.accepts(3));

        assert_eq!(Arity::new(3, 1), Arity::exact(3));
        assert!(Arity::none().accepts(0));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = HandlerRegistry::new();
        registry.register("BlogPost", &[("showAll", Arity::none())], |_| Echo);

        let entry = registry.lookup("Blogpost").unwrap();
        assert_eq!(entry.name(), "BlogPost");
        assert_eq!(entry.arity("showall"), Some(Arity::none()));
        assert_eq!(entry.arity("SHOWALL"), Some(Arity::none()));
        assert!(entry.arity("delete").is_none());
        assert!(registry.lookup("Comments").is_none());
    }

    #[tokio::test]
    async fn instantiated_controller_writes_to_sink() {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", &[("say", Arity::new(0, 3))], |_| Echo);

        let request = Arc::new(DispatchRequest::get("/echo/say/a/b"));
        let controller = registry.lookup("echo").unwrap().instantiate(&request);
        let mut ctx = ActionContext::new(
            request,
            vec!["a".into(), "b".into()],
            ResponseSink::new(""),
        );
        controller.call("say", &mut ctx).await.unwrap();

        assert_eq!(&ctx.into_output().body[..], b"say:a,b");
    }
}
