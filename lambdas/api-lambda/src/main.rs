use std::sync::Arc;

use lambda_http::{run, service_fn, Error};

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        // CloudWatch stamps every line already.
        .without_time()
        .init();

    let state = Arc::new(hyrax_shared::AppState::from_env());

    run(service_fn(move |event| {
        let state = state.clone();
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
