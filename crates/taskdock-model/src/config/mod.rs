mod redis;
pub use redis::RedisConfig;
