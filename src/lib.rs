/// WiFi 指纹定位库
///
/// 支持的功能：
/// - GPS 坐标大圆距离计算（Haversine）
/// - 位置指纹记录的生命周期管理（移动门限、指纹挂载、重置）
/// - 基于信号强度向量的最近邻位置估计
/// - 接入点观测的空间去重合并
/// - 扫描报文的接收、校验与存储
///
/// HTTP 传输层与持久化数据库由调用方负责，本库只提供核心算法
/// 与可并发访问的内存存储。

pub mod algorithms;
pub mod ingest;
pub mod positioning;
pub mod store;

pub use algorithms::*;
pub use ingest::*;
pub use positioning::*;
pub use store::*;
