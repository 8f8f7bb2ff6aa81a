mod api;
mod principal;

pub use api::{
    ChangePasswordRequest, CreateGuestRequest, HealthResponse, LoginRequest, LoginResponse,
    MessageResponse, PrincipalResponse,
};
pub use principal::{Principal, Role};
