/// 接入点观测空间去重
///
/// 将所有指纹记录展开为单个 (接入点, 位置) 观测，再把指向同一
/// 物理接入点的观测合并：BSSID 相同且坐标完全一致，或相距小于
/// 合并半径（GPS 噪声导致的近邻定位点），都视为同一接入点，
/// 保留 last_seen 较新的一条。
///
/// 合并是 O(n²) 的增量扫描，部署中接入点数量在几十到几百之间，
/// 可以接受。

use crate::algorithms::{geo, DedupedObservation, FingerprintRecord};

/// 同一接入点的合并半径（米）
///
/// 与创建记录时的 5 米移动门限是两个独立的常量：
/// 移动门限抑制近重复的记录，合并半径合并跨记录的近重复观测。
pub const MERGE_RADIUS_M: f64 = 50.0;

/// 将指纹记录展开为单个接入点观测
///
/// 按记录顺序逐条展开平行序列，每个观测携带所属记录的
/// 坐标与 last_seen。
pub fn flatten(records: &[FingerprintRecord]) -> Vec<DedupedObservation> {
    let mut observations = Vec::new();
    for record in records {
        for (bssid, rssi) in record.pairs() {
            observations.push(DedupedObservation {
                bssid: bssid.to_string(),
                rssi,
                latitude: record.latitude,
                longitude: record.longitude,
                last_seen: record.last_seen,
            });
        }
    }
    observations
}

/// 合并指向同一物理接入点的观测
///
/// 按输入顺序处理，对每个观测在输出列表中查找第一条
/// BSSID 相同且（坐标完全一致或相距小于 [`MERGE_RADIUS_M`]）的
/// 条目；找到则保留 last_seen 较新者的全部字段，否则追加为新条目。
pub fn merge(observations: Vec<DedupedObservation>) -> Vec<DedupedObservation> {
    let mut merged: Vec<DedupedObservation> = Vec::new();

    for obs in observations {
        let slot = merged.iter().position(|existing| {
            if existing.bssid != obs.bssid {
                return false;
            }
            let same_point =
                existing.latitude == obs.latitude && existing.longitude == obs.longitude;
            same_point
                || geo::distance(
                    existing.latitude,
                    existing.longitude,
                    obs.latitude,
                    obs.longitude,
                ) < MERGE_RADIUS_M
        });

        match slot {
            Some(index) => {
                if obs.last_seen > merged[index].last_seen {
                    merged[index] = obs;
                }
            }
            None => merged.push(obs),
        }
    }

    merged
}

/// 展开并合并所有指纹记录，得到去重后的接入点列表
pub fn deduplicate(records: &[FingerprintRecord]) -> Vec<DedupedObservation> {
    merge(flatten(records))
}
