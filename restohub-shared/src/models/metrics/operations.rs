/// Operations dashboards

use super::metric_table;
use crate::models::user::Role;

metric_table! {
    /// Headline figures: sales, attendance, labor cost against budget
    pub struct OperationDashboard / CreateOperationDashboard {
        table: "operation_dashboards",
        role: Role::Operations,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            today_sales: i32,
            #[validate(range(min = 0))]
            staff_attendance: i32,
            labor_cost_vs_budget: i32,
        }
    }
}

metric_table! {
    pub struct OperationReport / CreateOperationReport {
        table: "operation_reports",
        role: Role::Operations,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            today_sales: i32,
            #[validate(range(min = 0))]
            order_completed: i32,
            #[validate(range(min = 0, max = 100))]
            delivery_on_time_rate: i32,
            #[validate(range(min = 0))]
            shift_attendance: i32,
        }
    }
}

metric_table! {
    /// Orders by channel; `third_party_delivery` counts 3PD orders
    pub struct DailyOperationBreakdown / CreateDailyOperationBreakdown {
        table: "daily_operation_breakdowns",
        role: Role::Operations,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            in_store_orders: i32,
            #[validate(range(min = 0))]
            online_orders: i32,
            #[validate(range(min = 0))]
            third_party_delivery: i32,
            discounts_and_refunds: i32,
        }
    }
}

metric_table! {
    pub struct OperationFinancialBreakdown / CreateOperationFinancialBreakdown {
        table: "operation_financial_breakdowns",
        role: Role::Operations,
        order: "date DESC, amount DESC",
        fields: {
            #[validate(length(min = 1, max = 200))]
            category: String,
            #[validate(length(min = 1, max = 200))]
            source: String,
            amount: i32,
            #[validate(range(min = 0, max = 100))]
            percentage_of_total: i32,
        }
    }
}
