//! Backend REST paths consumed by the auth core, relative to the API base URL.

pub const LOGIN: &str = "/auth/login";
pub const REGISTER: &str = "/auth/register";
pub const LOGOUT: &str = "/auth/logout";
pub const REFRESH: &str = "/auth/refresh";
pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const RESET_PASSWORD: &str = "/auth/reset-password";
pub const VERIFY_EMAIL: &str = "/auth/verify-email";
pub const SOCIAL_GOOGLE: &str = "/auth/social/google";
pub const SOCIAL_FACEBOOK: &str = "/auth/social/facebook";

pub const UPDATE_PROFILE: &str = "/users/me";
pub const CHANGE_PASSWORD: &str = "/users/password";
