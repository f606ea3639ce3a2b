use axum::Router;

pub const TEST_JWT_SECRET: &str = "test-access-secret";
pub const TEST_JWT_REFRESH_SECRET: &str = "test-refresh-secret";

pub fn create_test_app() -> Router {
    std::env::set_var("NODE_ENV", "test");
    std::env::set_var("JWT_SECRET", TEST_JWT_SECRET);
    std::env::set_var("JWT_REFRESH_SECRET", TEST_JWT_REFRESH_SECRET);

    aptx_backend::create_app()
}
