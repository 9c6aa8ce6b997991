/// 位置估计算法
///
/// 将当前扫描的信号强度向量与所有已存指纹逐一比较，
/// 选出累计信号差异最小的指纹作为位置估计。
/// 这是一个 L1 型距离的单最近邻分类器，刻意不做归一化
/// 与距离加权。

use std::fmt;

use chrono::{DateTime, Utc};

use crate::algorithms::{FingerprintRecord, ScanReport};

/// 指纹中缺失的接入点按该信号强度计分（dBm）
///
/// 实况扫描中出现、候选指纹中缺失的接入点被视为
/// 边缘弱信号参与计分，而不是被排除。
pub const MISSING_RSSI_DBM: i16 = -100;

/// 位置估计结果
#[derive(Clone, Debug)]
pub struct PositionEstimate {
    /// 纬度（度）
    pub latitude: f64,
    /// 经度（度）
    pub longitude: f64,
    /// 命中的指纹记录 ID
    pub record_id: u64,
    /// 累计信号差异（越小越匹配）
    pub score: i64,
    /// 实况扫描与指纹重叠的接入点数量
    pub matched_aps: usize,
    /// 估计时间
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PositionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}) [记录 {}，差异 {}，重叠 {} AP]",
            self.latitude, self.longitude, self.record_id, self.score, self.matched_aps
        )
    }
}

/// 根据当前扫描与所有指纹记录估计位置
///
/// 计分方式：对实况扫描 observed 中的每个 (bssid, rssi)，
/// 累加 abs(rssi - 指纹中该 bssid 的值)，指纹缺失该 bssid 时
/// 以 [`MISSING_RSSI_DBM`] 代入。得分最小的记录胜出，得分相同时
/// 保留迭代顺序中先出现的记录。
///
/// # 返回
/// - 无当前扫描或无已挂载指纹的记录时返回 None
pub fn estimate(
    scan: Option<&ScanReport>,
    records: &[FingerprintRecord],
) -> Option<PositionEstimate> {
    let scan = scan?;
    let observed = scan.observed_map();

    let mut best: Option<(i64, usize, &FingerprintRecord)> = None;

    for record in records {
        if !record.is_fingerprinted() {
            continue;
        }

        let mut score: i64 = 0;
        let mut matched = 0usize;
        for (bssid, rssi) in &observed {
            let candidate = match record.rssi_for(bssid) {
                Some(value) => {
                    matched += 1;
                    value
                }
                None => MISSING_RSSI_DBM,
            };
            score += (*rssi as i64 - candidate as i64).abs();
        }

        let better = match &best {
            None => true,
            Some((best_score, _, _)) => score < *best_score,
        };
        if better {
            best = Some((score, matched, record));
        }
    }

    best.map(|(score, matched, record)| PositionEstimate {
        latitude: record.latitude,
        longitude: record.longitude,
        record_id: record.id,
        score,
        matched_aps: matched,
        timestamp: Utc::now(),
    })
}
