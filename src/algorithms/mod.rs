/// 定位算法模块
///
/// 该模块提供 WiFi 指纹定位的核心算法实现，支持：
/// - GPS 坐标间的大圆距离计算
/// - 指纹记录与扫描观测的数据结构
/// - 信号强度向量的最近邻匹配
/// - 同一物理接入点观测的空间去重

pub mod dedup;
pub mod geo;
pub mod matching;
pub mod observation;

pub use dedup::*;
pub use geo::*;
pub use matching::*;
pub use observation::*;
