//! # InvisiGuard 客户端 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │             展示层（CLI / 桌面 / Web 外壳）              │
//! │   选图 · 输入文本与强度 · 提交 · 渲染快照与结果          │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ WorkflowController（Result<T, SubmitError>）
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            客户端核心 (Rust)                     │
//! │                                                          │
//! │  ┌─ workflow ─── 三模式状态机 + InFlightGuard (RAII)      │
//! │  │                                                       │
//! │  ├─ validation ─ 文件 / 参数 / 请求级校验（纯函数）       │
//! │  │                                                       │
//! │  ├─ preview ──── 预览句柄 RAII + 注册表                   │
//! │  │                                                       │
//! │  ├─ gateway ──── BackendGateway trait                    │
//! │  │   ├─ http           reqwest multipart + 产物下载       │
//! │  │   └─ health         启动探活（单写多读）               │
//! │  │                                                       │
//! │  ├─ config           默认值 · JSON 文件 · 环境变量        │
//! │  └─ error            统一错误类型 AppError                │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ HTTP /api/v1/{health,embed,extract,verify}
//!   远端水印服务
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`asset`] | 用户选中的图片（字节 + 文件名 + 声明类型 + 体积） |
//! | [`validation`] | 提交前校验：类型、体积、文本、强度，汇总全部错误 |
//! | [`workflow`] | 每个模式的选图 → 校验 → 提交 → 结果状态机 |
//! | [`preview`] | 预览句柄的获取与自动释放 |
//! | [`gateway`] | 与远端服务的唯一边界：HTTP 实现、错误分类、健康探测 |
//! | [`config`] | 客户端配置的加载、覆盖与范围校验 |

pub mod asset;
pub mod config;
pub mod error;
pub mod gateway;
pub mod preview;
pub mod validation;
pub mod workflow;
