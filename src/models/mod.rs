//! 数据模型模块
//! 仅包含与后端认证接口交互的传输对象

pub mod auth;
