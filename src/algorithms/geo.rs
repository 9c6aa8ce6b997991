/// 地理距离计算
///
/// 基于球面地球模型的 Haversine 公式，计算两个 GPS 坐标之间的
/// 大圆距离。对称：distance(A,B) == distance(B,A)，相同坐标返回 0。

/// 地球平均半径（米）
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 计算两个坐标之间的大圆距离
///
/// # 参数
/// - `lat1`, `lon1`: 第一个点的纬度/经度（度）
/// - `lat2`, `lon2`: 第二个点的纬度/经度（度）
///
/// # 返回
/// - 距离（米）
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}
