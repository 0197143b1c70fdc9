/// Marketing manager dashboards
///
/// Satisfaction, efficiency and performance figures are percentages.

use super::metric_table;
use crate::models::user::Role;

metric_table! {
    pub struct MarketingDashboard / CreateMarketingDashboard {
        table: "marketing_dashboards",
        role: Role::MarketingManager,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            weekly_sales: i32,
            #[validate(range(min = 0, max = 100))]
            customer_satisfaction: i32,
            #[validate(range(min = 0, max = 100))]
            cost_efficiency: i32,
        }
    }
}

metric_table! {
    pub struct MarketingReport / CreateMarketingReport {
        table: "marketing_reports",
        role: Role::MarketingManager,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            weekly_sales: i32,
            #[validate(range(min = 0, max = 100))]
            cost_efficiency: i32,
            #[validate(range(min = 0, max = 100))]
            staff_performance_score: i32,
            #[validate(range(min = 0, max = 100))]
            customer_satisfaction: i32,
        }
    }
}

metric_table! {
    pub struct TeamPerformanceBreakdown / CreateTeamPerformanceBreakdown {
        table: "team_performance_breakdowns",
        role: Role::MarketingManager,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            staff_attendance: i32,
            #[validate(range(min = 0, max = 100))]
            sales_performance: i32,
            #[validate(range(min = 0, max = 100))]
            inventory_status: i32,
            #[validate(range(min = 0))]
            issues_complaints: i32,
        }
    }
}

metric_table! {
    pub struct StaffOpsBreakdown / CreateStaffOpsBreakdown {
        table: "staff_ops_breakdowns",
        role: Role::MarketingManager,
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
