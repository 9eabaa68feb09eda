use axum::http::StatusCode;

use crate::app::pages::{escape, layout};
use crate::dispatch::{ActionContext, ActionFuture, Controller, HandlerError};

/// Error controller; answers the not-found fallback.
pub struct Errors;

impl Controller for Errors {
    fn call<'a>(&'a self, action: &'a str, ctx: &'a mut ActionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            if action != "notfound" {
                return Err(HandlerError::UnknownAction(action.to_string()));
            }
            let path = escape(ctx.request().path());
            ctx.sink().set_status(StatusCode::NOT_FOUND);
            ctx.sink().write_str(&layout(
                "Not Found",
                &format!("<p>Nothing lives at <code>{}</code>.</p>", path),
            ));
            Ok(())
        })
    }
}
