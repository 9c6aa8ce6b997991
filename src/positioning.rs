/// WiFi 指纹定位服务
///
/// 将扫描接收、指纹存储、位置估计与接入点去重组合为一个
/// 可克隆、可并发访问的服务对象。每个入站操作（接收扫描、
/// 上报定位点、挂载指纹、读取估计、读取去重列表）独立执行，
/// 互不阻塞。HTTP 等传输层由调用方负责。

use serde_json::Value;

use crate::algorithms::{dedup, matching, DedupedObservation, PositionEstimate, ScanReport};
use crate::ingest::{IngestError, ScanIngestor};
use crate::store::{CreateOutcome, FingerprintStore, ScanStore, StoreError};

/// 定位服务
#[derive(Clone)]
pub struct PositioningService {
    scans: ScanStore,
    fingerprints: FingerprintStore,
    ingestor: ScanIngestor,
}

impl PositioningService {
    /// 创建空的定位服务
    pub fn new() -> Self {
        let scans = ScanStore::new();
        let ingestor = ScanIngestor::new(scans.clone());
        PositioningService {
            scans,
            fingerprints: FingerprintStore::new(),
            ingestor,
        }
    }

    /// 接收一条原始扫描负载
    ///
    /// 成功时返回扫描 ID，该扫描成为位置估计消费的“当前扫描”。
    pub async fn ingest_scan(&self, payload: &Value) -> Result<u64, IngestError> {
        self.ingestor.ingest(payload).await
    }

    /// 上报一个 GPS 定位点
    ///
    /// 与最近记录距离不足移动门限时返回 Ignored（非错误）。
    pub async fn report_fix(&self, latitude: f64, longitude: f64) -> CreateOutcome {
        self.fingerprints.create_candidate(latitude, longitude).await
    }

    /// 将指纹挂载到 [`report_fix`](Self::report_fix) 返回的记录
    pub async fn attach_fingerprint(
        &self,
        record_id: u64,
        bssids: Vec<String>,
        rssis: Vec<i16>,
    ) -> Result<(), StoreError> {
        self.fingerprints
            .attach_fingerprint(record_id, bssids, rssis)
            .await
    }

    /// 用当前扫描与全部指纹记录估计位置
    pub async fn estimate(&self) -> Option<PositionEstimate> {
        let scan = self.scans.current().await;
        let records = self.fingerprints.list_all().await;
        matching::estimate(scan.as_ref(), &records)
    }

    /// 去重后的接入点列表（供地图等外部消费）
    pub async fn access_points(&self) -> Vec<DedupedObservation> {
        let records = self.fingerprints.list_all().await;
        dedup::deduplicate(&records)
    }

    /// 最近的若干条扫描，从新到旧
    pub async fn recent_scans(&self, limit: usize) -> Vec<ScanReport> {
        self.scans.recent(limit).await
    }

    /// 管理操作：清空指纹存储并重置 ID 计数
    pub async fn reset_access_points(&self) {
        self.fingerprints.reset().await;
    }

    /// 管理操作：导出原始存储（扫描 + 指纹记录）为 JSON
    pub async fn export_json(&self) -> Result<String, serde_json::Error> {
        let scans = self.scans.recent(usize::MAX).await;
        let fingerprints = self.fingerprints.list_all().await;
        let export = serde_json::json!({
            "scans": scans,
            "fingerprints": fingerprints,
        });
        serde_json::to_string_pretty(&export)
    }

    /// 扫描存储句柄，与服务共享同一底层存储
    ///
    /// 供传输层直接访问列表、重置、导出等存储操作。
    pub fn scan_store(&self) -> &ScanStore {
        &self.scans
    }

    /// 指纹存储句柄，与服务共享同一底层存储
    pub fn fingerprint_store(&self) -> &FingerprintStore {
        &self.fingerprints
    }
}

impl Default for PositioningService {
    fn default() -> Self {
        Self::new()
    }
}
