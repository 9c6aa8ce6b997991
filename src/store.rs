/// 指纹与扫描的共享存储
///
/// 两个存储都是 Arc<Mutex<...>> 管理器，供并发请求共享。
/// 每个操作在一次加锁内完成，移动门限检查与插入因此是原子的，
/// 不会出现两个并发创建都通过了过期“最近记录”检查的情况。
/// 指纹挂载以创建时返回的显式记录 ID 为目标，而不是重新查询
/// “最近记录”。

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use log::debug;
use tokio::sync::Mutex;

use crate::algorithms::{FingerprintRecord, ScanReport};

/// 创建新定位记录所需的最小移动距离（米）
///
/// 传感器静止时的连续定位不会产生成堆的近重复记录。
pub const MIN_MOVE_DISTANCE_M: f64 = 5.0;

/// 存储层错误
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// bssid 与 rssi 平行序列长度不一致
    LengthMismatch { bssids: usize, rssis: usize },
    /// 目标记录不存在
    NoRecord { id: u64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LengthMismatch { bssids, rssis } => write!(
                f,
                "bssid 序列长度 {} 与 rssi 序列长度 {} 不一致",
                bssids, rssis
            ),
            StoreError::NoRecord { id } => write!(f, "指纹记录 {} 不存在", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// 创建候选记录的结果
///
/// 移动距离不足不是错误：调用成功，但写入被跳过，
/// 测得的距离随结果返回供诊断。
#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome {
    /// 新记录已创建
    Created { id: u64 },
    /// 与最近记录的距离小于移动门限，写入被跳过
    Ignored { distance_m: f64 },
}

impl CreateOutcome {
    /// 是否创建了新记录
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created { .. })
    }

    /// 被跳过时的原因描述（含测得距离）
    pub fn reason(&self) -> Option<String> {
        match self {
            CreateOutcome::Created { .. } => None,
            CreateOutcome::Ignored { distance_m } => Some(format!(
                "移动距离 {:.2} 米，小于门限 {} 米，忽略本次定位点",
                distance_m, MIN_MOVE_DISTANCE_M
            )),
        }
    }
}

struct FingerprintStoreInner {
    records: Vec<FingerprintRecord>,
    next_id: u64,
}

/// 指纹记录存储（线程安全）
#[derive(Clone)]
pub struct FingerprintStore {
    inner: Arc<Mutex<FingerprintStoreInner>>,
}

impl FingerprintStore {
    /// 创建空的指纹存储
    pub fn new() -> Self {
        FingerprintStore {
            inner: Arc::new(Mutex::new(FingerprintStoreInner {
                records: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// 根据定位点创建候选记录
    ///
    /// 与最近一条记录（按 last_seen）的距离小于
    /// [`MIN_MOVE_DISTANCE_M`] 时跳过写入。门限检查与插入
    /// 在同一次加锁内完成。
    pub async fn create_candidate(&self, latitude: f64, longitude: f64) -> CreateOutcome {
        let mut inner = self.inner.lock().await;

        if let Some(latest) = inner.records.iter().max_by_key(|r| r.last_seen) {
            let moved = latest.distance_to_point(latitude, longitude);
            if moved < MIN_MOVE_DISTANCE_M {
                debug!(
                    "忽略定位点 ({:.6}, {:.6})：距记录 {} 仅 {:.2} 米",
                    latitude, longitude, latest.id, moved
                );
                return CreateOutcome::Ignored { distance_m: moved };
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .records
            .push(FingerprintRecord::new(id, latitude, longitude));
        debug!("创建候选记录 {} @ ({:.6}, {:.6})", id, latitude, longitude);
        CreateOutcome::Created { id }
    }

    /// 将指纹挂载到指定记录
    ///
    /// 以 [`create_candidate`](Self::create_candidate) 返回的记录 ID
    /// 为目标。长度检查先于任何修改，失败时存储保持不变；
    /// 成功时整体覆盖两个平行序列并刷新 last_seen。
    pub async fn attach_fingerprint(
        &self,
        id: u64,
        bssids: Vec<String>,
        rssis: Vec<i16>,
    ) -> Result<(), StoreError> {
        if bssids.len() != rssis.len() {
            return Err(StoreError::LengthMismatch {
                bssids: bssids.len(),
                rssis: rssis.len(),
            });
        }

        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NoRecord { id })?;

        record.bssids = bssids;
        record.rssis = rssis;
        record.last_seen = Utc::now();
        debug!("记录 {} 挂载指纹，含 {} 个接入点", id, record.fingerprint_len());
        Ok(())
    }

    /// 列出所有记录，按 last_seen 降序
    ///
    /// 列出前惰性清理：空指纹的记录对匹配与去重无贡献，直接
    /// 丢弃；唯一的例外是最新创建的那条（等待挂载的在途候选）。
    pub async fn list_all(&self) -> Vec<FingerprintRecord> {
        let mut inner = self.inner.lock().await;

        // 例外以创建顺序（ID）为准：挂载会刷新较早记录的 last_seen，
        // 不能据此判断谁是在途候选
        let newest_id = inner.records.iter().map(|r| r.id).max();
        inner
            .records
            .retain(|r| r.is_fingerprinted() || Some(r.id) == newest_id);

        let mut records = inner.records.clone();
        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        records
    }

    /// 记录数量
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.records.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.records.is_empty()
    }

    /// 清空所有记录并重置 ID 计数
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
        inner.next_id = 1;
        debug!("指纹存储已重置");
    }

    /// 导出全部记录为 JSON
    pub async fn export_json(&self) -> Result<String, serde_json::Error> {
        let records = self.list_all().await;
        serde_json::to_string_pretty(&records)
    }
}

impl Default for FingerprintStore {
    fn default() -> Self {
        Self::new()
    }
}

struct ScanStoreInner {
    scans: Vec<ScanReport>,
    next_id: u64,
}

/// 扫描报文存储（线程安全）
///
/// 保留全部历史报文用于列表查询，位置估计只消费最新一条。
#[derive(Clone)]
pub struct ScanStore {
    inner: Arc<Mutex<ScanStoreInner>>,
}

impl ScanStore {
    /// 创建空的扫描存储
    pub fn new() -> Self {
        ScanStore {
            inner: Arc::new(Mutex::new(ScanStoreInner {
                scans: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// 入库一条扫描报文，分配并返回其 ID
    pub async fn insert(&self, mut report: ScanReport) -> u64 {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        report.id = id;
        debug!(
            "入库扫描 {}（设备 {}，{} 条观测）",
            id,
            report.device_id,
            report.observation_count()
        );
        inner.scans.push(report);
        id
    }

    /// 最近一次入库的扫描（“当前扫描”）
    pub async fn current(&self) -> Option<ScanReport> {
        let inner = self.inner.lock().await;
        inner.scans.last().cloned()
    }

    /// 最近的若干条扫描，按入库时间从新到旧
    pub async fn recent(&self, limit: usize) -> Vec<ScanReport> {
        let inner = self.inner.lock().await;
        inner.scans.iter().rev().take(limit).cloned().collect()
    }

    /// 扫描数量
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.scans.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.scans.is_empty()
    }

    /// 清空所有扫描并重置 ID 计数
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.scans.clear();
        inner.next_id = 1;
        debug!("扫描存储已重置");
    }

    /// 导出全部扫描为 JSON
    pub async fn export_json(&self) -> Result<String, serde_json::Error> {
        let inner = self.inner.lock().await;
        serde_json::to_string_pretty(&inner.scans)
    }
}

impl Default for ScanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_candidate_movement_gate() {
        tokio_test::block_on(async {
            let store = FingerprintStore::new();

            // 第一条记录无比较对象，直接创建
            let first = store.create_candidate(48.8566, 2.3522).await;
            assert_eq!(first, CreateOutcome::Created { id: 1 });

            // 约 3 米：小于门限，跳过
            let near = store.create_candidate(48.8566 + 0.000027, 2.3522).await;
            assert!(!near.is_created());
            match near {
                CreateOutcome::Ignored { distance_m } => {
                    assert!(distance_m > 2.5 && distance_m < 3.5);
                }
                _ => panic!("应为 Ignored"),
            }
            assert_eq!(store.len().await, 1);

            // 约 10 米：创建第二条
            let far = store.create_candidate(48.8566 + 0.00009, 2.3522).await;
            assert_eq!(far, CreateOutcome::Created { id: 2 });
            assert_eq!(store.len().await, 2);
        });
    }

    #[test]
    fn test_ignored_reason_reports_distance() {
        tokio_test::block_on(async {
            let store = FingerprintStore::new();
            store.create_candidate(48.8566, 2.3522).await;

            let outcome = store.create_candidate(48.8566 + 0.000027, 2.3522).await;
            let reason = outcome.reason().unwrap();
            assert!(reason.contains("米"), "原因描述应包含距离: {}", reason);

            let created = store.create_candidate(48.9, 2.4).await;
            assert!(created.reason().is_none());
        });
    }

    #[tokio::test]
    async fn test_attach_fingerprint_by_id() {
        let store = FingerprintStore::new();
        let id = match store.create_candidate(48.8566, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };

        store
            .attach_fingerprint(
                id,
                vec!["AA:BB:CC:DD:EE:FF".to_string()],
                vec![-47],
            )
            .await
            .unwrap();

        let records = store.list_all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_fingerprinted());
        assert_eq!(records[0].rssi_for("AA:BB:CC:DD:EE:FF"), Some(-47));
    }

    #[tokio::test]
    async fn test_attach_length_mismatch_leaves_store_unchanged() {
        let store = FingerprintStore::new();
        let id = match store.create_candidate(48.8566, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };

        let err = store
            .attach_fingerprint(
                id,
                vec!["AA:BB:CC:DD:EE:FF".to_string(), "11:22:33:44:55:66".to_string()],
                vec![-40],
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::LengthMismatch { bssids: 2, rssis: 1 });

        // 记录保持空指纹，无部分写入
        let records = store.list_all().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_fingerprinted());
    }

    #[tokio::test]
    async fn test_attach_missing_record() {
        let store = FingerprintStore::new();
        let err = store
            .attach_fingerprint(42, vec!["AA:BB:CC:DD:EE:FF".to_string()], vec![-47])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NoRecord { id: 42 });
    }

    #[tokio::test]
    async fn test_list_all_purges_stale_candidates() {
        let store = FingerprintStore::new();

        // 记录 1：创建并挂载指纹
        let id1 = match store.create_candidate(48.8566, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };
        store
            .attach_fingerprint(id1, vec!["AA:BB:CC:DD:EE:FF".to_string()], vec![-47])
            .await
            .unwrap();

        // 记录 2：未挂载就被记录 3 取代，成为过期候选
        store.create_candidate(48.8566 + 0.0009, 2.3522).await;
        store.create_candidate(48.8566 + 0.0018, 2.3522).await;

        let records = store.list_all().await;
        // 过期候选被清理，保留指纹记录与最新在途候选
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 3);
        assert_eq!(records[1].id, id1);

        // 最新候选仍可挂载
        store
            .attach_fingerprint(3, vec!["11:22:33:44:55:66".to_string()], vec![-60])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_attach_to_older_record_keeps_live_candidate() {
        let store = FingerprintStore::new();

        let id1 = match store.create_candidate(48.8566, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };
        let id2 = match store.create_candidate(48.8566 + 0.0009, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };

        // 先给较早的记录挂载指纹，其 last_seen 被刷新为最新
        store
            .attach_fingerprint(id1, vec!["AA:BB:CC:DD:EE:FF".to_string()], vec![-47])
            .await
            .unwrap();

        // 列表读取不得清掉最新创建的在途候选
        let records = store.list_all().await;
        assert!(
            records.iter().any(|r| r.id == id2),
            "在途候选 {} 不应被清理",
            id2
        );

        // 之前返回的 ID 仍然有效
        store
            .attach_fingerprint(id2, vec!["11:22:33:44:55:66".to_string()], vec![-60])
            .await
            .unwrap();
        let records = store.list_all().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_fingerprinted()));
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_last_seen_desc() {
        let store = FingerprintStore::new();
        for i in 0..3u64 {
            let lat = 48.0 + i as f64 * 0.001;
            match store.create_candidate(lat, 2.0).await {
                CreateOutcome::Created { id } => {
                    store
                        .attach_fingerprint(
                            id,
                            vec![format!("AA:BB:CC:DD:EE:0{}", i)],
                            vec![-50],
                        )
                        .await
                        .unwrap();
                }
                _ => panic!("创建失败"),
            }
        }

        let records = store.list_all().await;
        assert_eq!(records.len(), 3);
        for pair in records.windows(2) {
            assert!(pair[0].last_seen >= pair[1].last_seen);
        }
    }

    #[tokio::test]
    async fn test_reset_restarts_id_assignment() {
        let store = FingerprintStore::new();
        store.create_candidate(48.8566, 2.3522).await;
        store.create_candidate(48.9, 2.4).await;
        assert_eq!(store.len().await, 2);

        store.reset().await;
        assert!(store.is_empty().await);

        let outcome = store.create_candidate(48.8566, 2.3522).await;
        assert_eq!(outcome, CreateOutcome::Created { id: 1 });
    }

    #[tokio::test]
    async fn test_scan_store_current_and_recent() {
        let store = ScanStore::new();
        assert!(store.current().await.is_none());

        for i in 0..3i64 {
            let report = ScanReport::new(format!("esp32-0{}", i), Some(i * 1000), Vec::new());
            let id = store.insert(report).await;
            assert_eq!(id, i as u64 + 1);
        }

        let current = store.current().await.unwrap();
        assert_eq!(current.id, 3);
        assert_eq!(current.device_id, "esp32-02");

        let recent = store.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].id, 2);

        store.reset().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_export_json_round_trip() {
        let store = FingerprintStore::new();
        let id = match store.create_candidate(48.8566, 2.3522).await {
            CreateOutcome::Created { id } => id,
            _ => panic!("创建失败"),
        };
        store
            .attach_fingerprint(id, vec!["AA:BB:CC:DD:EE:FF".to_string()], vec![-47])
            .await
            .unwrap();

        let json = store.export_json().await.unwrap();
        let parsed: Vec<FingerprintRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, id);
        assert_eq!(parsed[0].rssi_for("AA:BB:CC:DD:EE:FF"), Some(-47));
    }
}
