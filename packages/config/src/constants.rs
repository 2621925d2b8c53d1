// ABOUTME: Environment variable name constants and vendor defaults
// ABOUTME: Centralized definitions of the SDK script locations used by social-login

// SDK Script Locations
pub const SOCIAL_LOGIN_GOOGLE_SDK_URL: &str = "SOCIAL_LOGIN_GOOGLE_SDK_URL";
pub const SOCIAL_LOGIN_FACEBOOK_SDK_URL: &str = "SOCIAL_LOGIN_FACEBOOK_SDK_URL";
pub const SOCIAL_LOGIN_APPLE_SDK_URL: &str = "SOCIAL_LOGIN_APPLE_SDK_URL";

// Vendor SDK Options
pub const SOCIAL_LOGIN_FACEBOOK_SDK_VERSION: &str = "SOCIAL_LOGIN_FACEBOOK_SDK_VERSION";

// Public vendor defaults
pub const DEFAULT_GOOGLE_SDK_URL: &str = "https://apis.google.com/js/platform.js";
pub const DEFAULT_FACEBOOK_SDK_URL: &str = "https://connect.facebook.net/en_US/sdk.js";
pub const DEFAULT_APPLE_SDK_URL: &str =
    "https://appleid.cdn-apple.com/appleauth/static/jsapi/appleid/1/en_US/appleid.auth.js";
pub const DEFAULT_FACEBOOK_SDK_VERSION: &str = "v18.0";
