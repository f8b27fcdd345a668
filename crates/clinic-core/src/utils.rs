//! 通用工具函数

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::VisitProcedure;

/// 货币金额四舍五入到两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 患者应收余额 = 累计就诊费用 - 累计付款
pub fn outstanding_balance(total_cost: f64, total_paid: f64) -> f64 {
    round2(total_cost - total_paid)
}

/// 就诊项目明细合计（按读取时的当前价格）
pub fn line_items_total(items: &[VisitProcedure]) -> f64 {
    items
        .iter()
        .map(|item| item.price_jod * item.quantity as f64)
        .sum()
}

/// 生成影像文件的相对存储路径: <patient_id>/<时间戳>.<扩展名>
///
/// 扩展名取原始文件名最后一个点之后的部分，无点时沿用整个文件名。
pub fn image_file_name(patient_id: Uuid, original_name: &str, now: DateTime<Utc>) -> String {
    let extension = original_name.rsplit('.').next().unwrap_or("bin");
    format!("{}/{}.{}", patient_id, now.format("%Y%m%d_%H%M%S"), extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(price: f64, quantity: i32) -> VisitProcedure {
        VisitProcedure {
            id: Uuid::new_v4(),
            name: "item".to_string(),
            price_jod: price,
            quantity,
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(10.004), 10.0);
        assert_eq!(round2(-3.336), -3.34);
        assert_eq!(round2(20.0), 20.0);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_outstanding_balance_empty_patient_is_zero() {
        // 无就诊且无付款的患者余额为 0
        assert_eq!(outstanding_balance(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_outstanding_balance_worked_example() {
        // 一次就诊: 项目A 20.0 x1 + 项目B 5.0 x2 = 30.0，付款 10.0
        let total = line_items_total(&[item(20.0, 1), item(5.0, 2)]);
        assert_eq!(total, 30.0);
        assert_eq!(outstanding_balance(total, 10.0), 20.0);
    }

    #[test]
    fn test_outstanding_balance_can_go_negative() {
        // 多付时余额为负（预存）
        assert_eq!(outstanding_balance(10.0, 25.0), -15.0);
    }

    #[test]
    fn test_line_items_total_order_independent() {
        let a = line_items_total(&[item(12.5, 2), item(3.0, 1), item(0.75, 4)]);
        let b = line_items_total(&[item(0.75, 4), item(12.5, 2), item(3.0, 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_image_file_name() {
        let patient_id = Uuid::nil();
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            image_file_name(patient_id, "scan.png", now),
            format!("{}/20250314_092653.png", patient_id)
        );
        // 无扩展名时沿用整个文件名，与参考实现一致
        assert_eq!(
            image_file_name(patient_id, "xray", now),
            format!("{}/20250314_092653.xray", patient_id)
        );
    }
}
