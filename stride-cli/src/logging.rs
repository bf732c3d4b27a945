use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;

pub(crate) struct LogRequestMiddleware;

#[async_trait::async_trait]
impl Middleware for LogRequestMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        tracing::info!(
            url = %req.url(),
            method = %req.method(),
            headers = ?req.headers(),
            "Running request"
        );
        let resp = next.run(req, extensions).await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            // Leave the body alone, the caller decodes the error
            // envelope out of it.
            tracing::error!(?status, "Error status on response");
        } else {
            let content_length = resp.content_length();
            tracing::info!(?status, ?content_length, "Got response");
        }
        Ok(resp)
    }
}
