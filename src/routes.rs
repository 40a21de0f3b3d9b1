use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::auth_handlers::{self, SocketTokenResponse},
    conversation::{
        conversation_dto::{ConversationSummary, FindOrCreateRequest, FindOrCreateResponse},
        conversation_handlers,
    },
    message::message_models::Message,
    middleware::auth_middleware,
    state::AppState,
    user::UserProfile,
    websocket,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::auth_handlers::issue_socket_token,
        crate::conversation::conversation_handlers::find_or_create_conversation,
        crate::conversation::conversation_handlers::get_conversations,
        crate::conversation::conversation_handlers::get_conversation_messages,
    ),
    components(
        schemas(
            SocketTokenResponse,
            FindOrCreateRequest,
            FindOrCreateResponse,
            ConversationSummary,
            Message,
            UserProfile,
        )
    ),
    tags(
        (name = "auth", description = "Handshake token endpoint"),
        (name = "conversations", description = "Conversation and message history endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/socket-token", get(auth_handlers::issue_socket_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let conversation_routes = Router::new()
        .route("/", get(conversation_handlers::get_conversations))
        .route(
            "/find-or-create",
            post(conversation_handlers::find_or_create_conversation),
        )
        .route(
            "/:id/messages",
            get(conversation_handlers::get_conversation_messages),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The realtime endpoint sits behind the same authenticator; a bad
    // credential is refused before the upgrade completes.
    let ws_routes = Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/conversations", conversation_routes)
        .merge(ws_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
