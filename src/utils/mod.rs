pub mod logger;
pub mod validator;
