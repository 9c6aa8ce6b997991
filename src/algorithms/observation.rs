/// 观测与指纹数据结构定义

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::algorithms::geo;

/// BSSID 格式（AA:BB:CC:DD:EE:FF）
pub const BSSID_PATTERN: &str = "^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$";

static BSSID_RE: OnceLock<Regex> = OnceLock::new();

/// 检查 BSSID 是否符合 AA:BB:CC:DD:EE:FF 格式
pub fn is_well_formed_bssid(bssid: &str) -> bool {
    let re = BSSID_RE.get_or_init(|| {
        // 固定字面量，编译不会失败
        Regex::new(BSSID_PATTERN).expect("BSSID 正则表达式无效")
    });
    re.is_match(bssid)
}

/// 单次扫描中观测到的一个网络
///
/// 入库后不可变。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NetworkObservation {
    /// 网络名称（可被多个 BSSID 共享）
    pub ssid: String,
    /// 接入点射频的唯一硬件标识
    pub bssid: String,
    /// 信号强度 (dBm)，越负越弱
    pub rssi: i16,
    /// 信道号
    pub channel: i32,
    /// 加密方式
    pub encryption: String,
    /// 传感器分组时所用的逻辑组 SSID
    pub group_ssid: String,
}

impl NetworkObservation {
    /// 创建新的网络观测
    pub fn new(
        ssid: String,
        bssid: String,
        rssi: i16,
        channel: i32,
        encryption: String,
        group_ssid: String,
    ) -> Self {
        NetworkObservation {
            ssid,
            bssid,
            rssi,
            channel,
            encryption,
            group_ssid,
        }
    }

    /// BSSID 是否符合标准格式
    pub fn bssid_is_well_formed(&self) -> bool {
        is_well_formed_bssid(&self.bssid)
    }
}

/// 一次完整的扫描报文
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanReport {
    /// 扫描 ID，入库时由 ScanStore 分配
    pub id: u64,
    /// 上报设备标识
    pub device_id: String,
    /// 传感器侧时间戳（毫秒，可缺失）
    pub timestamp_ms: Option<i64>,
    /// 服务端接收时间
    pub received_at: DateTime<Utc>,
    /// 观测列表（保持上报顺序）
    pub observations: Vec<NetworkObservation>,
}

impl ScanReport {
    /// 创建新的扫描报文
    pub fn new(
        device_id: String,
        timestamp_ms: Option<i64>,
        observations: Vec<NetworkObservation>,
    ) -> Self {
        ScanReport {
            id: 0,
            device_id,
            timestamp_ms,
            received_at: Utc::now(),
            observations,
        }
    }

    /// 构建 bssid -> rssi 的映射
    ///
    /// 同一 BSSID 出现多次时保留最后一个值。
    pub fn observed_map(&self) -> HashMap<String, i16> {
        let mut map = HashMap::new();
        for obs in &self.observations {
            map.insert(obs.bssid.clone(), obs.rssi);
        }
        map
    }

    /// 观测数量
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }
}

/// 位置指纹记录
///
/// 指纹由 bssids 与 rssis 两个等长的平行序列构成，
/// 仅能通过存储层的挂载操作整体更新，保证等长不变式。
/// 指纹为空的记录是“候选”记录，挂载后成为可用于匹配的指纹记录。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// 记录 ID（单调分配，唯一）
    pub id: u64,
    /// 纬度（度）
    pub latitude: f64,
    /// 经度（度）
    pub longitude: f64,
    /// 指纹中各接入点的 BSSID
    pub bssids: Vec<String>,
    /// 与 bssids 平行的 RSSI 序列
    pub rssis: Vec<i16>,
    /// 最后更新时间
    pub last_seen: DateTime<Utc>,
}

impl FingerprintRecord {
    /// 创建空指纹的候选记录
    pub fn new(id: u64, latitude: f64, longitude: f64) -> Self {
        FingerprintRecord {
            id,
            latitude,
            longitude,
            bssids: Vec::new(),
            rssis: Vec::new(),
            last_seen: Utc::now(),
        }
    }

    /// 是否已挂载指纹
    pub fn is_fingerprinted(&self) -> bool {
        !self.bssids.is_empty()
    }

    /// 迭代指纹的 (bssid, rssi) 对
    pub fn pairs(&self) -> impl Iterator<Item = (&str, i16)> {
        self.bssids
            .iter()
            .map(|b| b.as_str())
            .zip(self.rssis.iter().copied())
    }

    /// 查找指纹中某个 BSSID 的信号强度
    pub fn rssi_for(&self, bssid: &str) -> Option<i16> {
        self.pairs().find(|(b, _)| *b == bssid).map(|(_, r)| r)
    }

    /// 指纹中的接入点数量
    pub fn fingerprint_len(&self) -> usize {
        self.bssids.len()
    }

    /// 到任意坐标的大圆距离（米）
    pub fn distance_to_point(&self, latitude: f64, longitude: f64) -> f64 {
        geo::distance(self.latitude, self.longitude, latitude, longitude)
    }
}

/// 去重后的接入点观测（派生数据，不持久化）
///
/// 每行对应一个 (接入点, 合并后位置) 对。
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DedupedObservation {
    /// 接入点 BSSID
    pub bssid: String,
    /// 信号强度 (dBm)
    pub rssi: i16,
    /// 纬度（度）
    pub latitude: f64,
    /// 经度（度）
    pub longitude: f64,
    /// 最后观测时间
    pub last_seen: DateTime<Utc>,
}
