pub mod config;
pub mod entities;
pub mod error;
pub mod models;
pub mod role;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{MedeventaError, ReasonCode, Result as MedeventaResult};

// 配置相关
pub use config::AppConfig;

// 角色
pub use role::Role;

// 兼容性别名（Result 是更常用的名称）
pub use error::Result;
