//! The [`rqm::Middleware`] surface of [`PaymentClient`].

use http::Extensions;
use proxy402::PaymentError;
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use tracing::{debug, instrument};

use super::{FirstResponse, PaymentClient, presigned_receipt, with_settlement};
use crate::constants::X_PAYMENT_HEADER;

/// Runs the next middleware or the HTTP client.
#[instrument(name = "proxy402.next", skip_all)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

fn middleware_error(error: PaymentError) -> rqm::Error {
    rqm::Error::Middleware(error.into())
}

#[async_trait::async_trait]
impl rqm::Middleware for PaymentClient {
    /// Pays a 402 answer and retries the request once.
    ///
    /// The [`PaymentReceipt`](super::PaymentReceipt) of a paid request is
    /// stored in the response extensions.
    #[instrument(name = "proxy402.handle", skip_all, fields(url = %req.url()), err)]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        if req.headers().contains_key(X_PAYMENT_HEADER) {
            debug!("request carries its own payment, sending as-is");
            let receipt = presigned_receipt(req.headers());
            let res = run_next(next, req, extensions).await?;
            return Ok(with_settlement(res, receipt).into_response());
        }

        let retry_req = req.try_clone();
        debug!(state = "awaiting_first_response");
        let res = run_next(next.clone(), req, extensions).await?;
        let challenge = match self.classify(res).await.map_err(middleware_error)? {
            FirstResponse::PassThrough(res) => return Ok(res),
            FirstResponse::Challenge(challenge) => challenge,
        };

        let mut retry =
            retry_req.ok_or_else(|| middleware_error(PaymentError::RequestNotCloneable))?;
        let prepared = self
            .prepare_payment(&challenge)
            .await
            .map_err(middleware_error)?;
        prepared.attach(&mut retry).map_err(middleware_error)?;

        debug!(state = "retrying");
        let res = run_next(next, retry, extensions).await?;
        let paid = self.finish(prepared, res).await.map_err(middleware_error)?;
        Ok(paid.into_response())
    }
}
