pub mod rate_limit_server;
