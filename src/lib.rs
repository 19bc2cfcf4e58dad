pub mod app;
pub mod config;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod aes;
    pub mod credentials;
}

pub mod models {
    pub mod claims;
    pub mod scan;
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod api_client;
    pub mod identity_cookies;
    pub mod refresh;
    pub mod session_store;
}

pub mod handlers {
    pub mod auth;
    pub mod client;
    pub mod pages;
    pub mod scan;
}

pub mod middleware_layer {
    pub mod gate;
    pub mod routes;
}

pub mod validation {
    pub mod auth;
}
