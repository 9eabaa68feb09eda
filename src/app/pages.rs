use axum::http::StatusCode;

use crate::dispatch::{ActionContext, ActionFuture, Controller, HandlerError};

pub struct Pages;

impl Controller for Pages {
    fn call<'a>(&'a self, action: &'a str, ctx: &'a mut ActionContext) -> ActionFuture<'a> {
        Box::pin(async move {
            match action {
                "index" => {
                    ctx.sink().write_str(&layout("Home", "<p>It works.</p>"));
                }
                "show" => {
                    let slug = escape(ctx.param(0).unwrap_or_default());
                    let page = match ctx.param(1) {
                        Some(p) => format!("<p>{} (page {})</p>", slug, escape(p)),
                        None => format!("<p>{}</p>", slug),
                    };
                    ctx.sink().write_str(&layout("Page", &page));
                }
                "about" => {
                    ctx.sink().write_str(&layout("About", "<p>Served by route-cache.</p>"));
                }
                "contact" => contact(ctx),
                other => return Err(HandlerError::UnknownAction(other.to_string())),
            }
            Ok(())
        })
    }
}

/// Form posts redirect back to the index; XHR posts get a bare 204.
fn contact(ctx: &mut ActionContext) {
    if !ctx.request().is_post() {
        let form = "<form method=\"post\"><input name=\"message\"><button>Send</button></form>";
        ctx.sink().write_str(&layout("Contact", form));
        return;
    }

    let message = ctx.request().form_value("message").unwrap_or_default().len();
    tracing::info!(bytes = message, "Contact message received");
    if ctx.request().is_xhr() {
        ctx.sink().set_status(StatusCode::NO_CONTENT);
    } else {
        ctx.sink().redirect("pages/index");
    }
}

pub(crate) fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>\n",
        title, title, body
    )
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
