/// 扫描报文接收与校验
///
/// 传感器（ESP32）上报的 JSON 负载先经过命名字段的 serde 模式
/// 校验，再展开为观测列表入库。形状不符（例如 `groups` 不是
/// 数组）在任何处理开始前即被拒绝；单个观测字段只做存在性
/// 检查，不做取值校验。

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algorithms::{is_well_formed_bssid, NetworkObservation, ScanReport, MISSING_RSSI_DBM};
use crate::store::ScanStore;

/// 接收层错误
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestError {
    /// 负载无法解析或形状不符合约定
    MalformedInput(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::MalformedInput(detail) => write!(f, "负载格式错误: {}", detail),
        }
    }
}

impl std::error::Error for IngestError {}

fn default_device_id() -> String {
    "unknown".to_string()
}

/// 传感器上报的完整负载
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanPayload {
    /// 设备标识，缺失时记为 "unknown"
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// 传感器侧时间戳（毫秒）
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    /// 按 SSID 分组的观测
    #[serde(default)]
    pub groups: Vec<ScanGroup>,
}

/// 一组同名网络的观测
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanGroup {
    /// 组 SSID
    #[serde(default)]
    pub ssid: String,
    /// 组内最强信号
    #[serde(default, rename = "bestRssi")]
    pub best_rssi: Option<i16>,
    /// 组内各接入点的观测
    #[serde(default)]
    pub items: Vec<ScanItem>,
}

/// 单个接入点的原始观测
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanItem {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub bssid: String,
    #[serde(default)]
    pub rssi: Option<i16>,
    #[serde(default)]
    pub channel: Option<i32>,
    #[serde(default, rename = "enc")]
    pub encryption: String,
}

impl ScanPayload {
    /// 展开为扫描报文
    ///
    /// 每条观测携带其所属组的 SSID；缺失的 RSSI 按
    /// [`MISSING_RSSI_DBM`] 记录。
    pub fn into_report(self) -> ScanReport {
        let mut observations = Vec::new();
        for group in &self.groups {
            for item in &group.items {
                observations.push(NetworkObservation::new(
                    item.ssid.clone(),
                    item.bssid.clone(),
                    item.rssi.unwrap_or(MISSING_RSSI_DBM),
                    item.channel.unwrap_or(0),
                    item.encryption.clone(),
                    group.ssid.clone(),
                ));
            }
        }
        ScanReport::new(self.device_id, self.timestamp_ms, observations)
    }
}

/// 扫描报文接收器
#[derive(Clone)]
pub struct ScanIngestor {
    scans: ScanStore,
}

impl ScanIngestor {
    /// 创建绑定到指定扫描存储的接收器
    pub fn new(scans: ScanStore) -> Self {
        ScanIngestor { scans }
    }

    /// 解析并校验原始 JSON 负载
    ///
    /// `groups` 字段存在但不是数组时直接拒绝；其余形状不符
    /// 由 serde 报出，统一归为 [`IngestError::MalformedInput`]。
    pub fn parse_payload(value: &Value) -> Result<ScanPayload, IngestError> {
        if let Some(groups) = value.get("groups") {
            if !groups.is_array() {
                return Err(IngestError::MalformedInput(
                    "`groups` 必须是数组".to_string(),
                ));
            }
        }

        serde_json::from_value(value.clone())
            .map_err(|e| IngestError::MalformedInput(format!("负载解析失败: {}", e)))
    }

    /// 接收一条原始扫描负载并入库
    ///
    /// 成功时返回新扫描的 ID，该扫描成为位置估计消费的
    /// “当前扫描”。
    pub async fn ingest(&self, payload: &Value) -> Result<u64, IngestError> {
        let parsed = Self::parse_payload(payload)?;
        let report = parsed.into_report();

        // 诊断：格式异常的 BSSID 只记日志，不拒绝
        for obs in &report.observations {
            if !is_well_formed_bssid(&obs.bssid) {
                warn!(
                    "设备 {} 上报了格式异常的 BSSID: {:?}",
                    report.device_id, obs.bssid
                );
            }
        }

        let id = self.scans.insert(report).await;
        Ok(id)
    }
}
