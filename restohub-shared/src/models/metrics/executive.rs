/// Executive dashboards

use super::metric_table;
use crate::models::user::Role;

metric_table! {
    /// `store_growth_comparison` is a signed growth percentage
    pub struct ExecutiveDashboard / CreateExecutiveDashboard {
        table: "executive_dashboards",
        role: Role::Executive,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            total_sales_revenue: i32,
            net_profit: i32,
            store_growth_comparison: i32,
        }
    }
}

metric_table! {
    pub struct ExecutiveReport / CreateExecutiveReport {
        table: "executive_reports",
        role: Role::Executive,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            total_revenue: i32,
            #[validate(range(min = 0))]
            total_outlets: i32,
            #[validate(range(min = 0))]
            branches_meeting_sales_target: i32,
            #[validate(range(min = 0))]
            active_promotions: i32,
        }
    }
}

metric_table! {
    pub struct BusinessHealthBreakdown / CreateBusinessHealthBreakdown {
        table: "business_health_breakdowns",
        role: Role::Executive,
        order: "date DESC, extracted_at DESC",
        fields: {
            #[validate(range(min = 0))]
            sales_revenue: i32,
            #[validate(range(min = 0))]
            expenses_costs: i32,
            marketing_campaigns_roi: i32,
            #[validate(range(min = 0))]
            risk_loss: i32,
        }
    }
}

metric_table! {
    pub struct ExecutiveFinancialBreakdown / CreateExecutiveFinancialBreakdown {
        table: "executive_financial_breakdowns",
        role: Role::Executive,
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
