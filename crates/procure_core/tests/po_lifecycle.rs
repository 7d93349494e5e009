mod common;

use common::{line, money, seed, setup, simple_request};
use procure_core::model::directory::UserId;
use procure_core::model::purchase_order::{
    Approval, CreatePoRequest, NewPurchaseOrder, PoId, PoSummary, PoTotals, PricedLine,
    PurchaseOrder, UpdateLinesRequest,
};
use procure_core::model::status::{PoStatus, StatusDefinition, WorkflowAction};
use procure_core::model::validation::ValidationError;
use procure_core::money::Rate;
use procure_core::pricing::PricingError;
use procure_core::repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
use procure_core::repo::directory_repo::{SqliteSupplierRepository, SqliteUserRepository};
use procure_core::repo::po_repo::{
    PoListQuery, PurchaseOrderRepository, SqlitePurchaseOrderRepository, StatusCount,
};
use procure_core::repo::settings_repo::SqliteSettingsRepository;
use procure_core::repo::{RepoError, RepoResult};
use procure_core::service::approval_service::ApprovalService;
use procure_core::service::directory_service::DirectoryService;
use procure_core::service::po_service::PurchaseOrderService;
use procure_core::service::settings_service::SettingsService;
use procure_core::service::ServiceError;
use uuid::Uuid;

#[test]
fn create_assigns_number_totals_and_pending_status() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();

    let po = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();

    assert_eq!(po.po_number, 1);
    assert_eq!(po.display_number, "PO-000001");
    assert_eq!(po.status, PoStatus::Pending);
    assert_eq!(po.requestor_id, seed.requestor.id);
    assert_eq!(po.department_id, Some(seed.department.id));
    assert_eq!(po.vat_rate.bps(), 1200);
    assert_eq!(po.totals.subtotal, money("351.00"));
    assert_eq!(po.totals.discount, money("51.00"));
    assert_eq!(po.totals.vat, money("36.00"));
    assert_eq!(po.totals.shipping, money("150.00"));
    assert_eq!(po.totals.total, money("486.00"));

    assert_eq!(po.lines.len(), 2);
    assert_eq!(po.lines[0].line_no, 1);
    assert_eq!(po.lines[0].item_name, "Bond paper A4");
    assert_eq!(po.lines[0].unit, "ream");
    assert_eq!(po.lines[0].amount, money("300.00"));
    assert_eq!(po.lines[1].amount, money("51.00"));

    let history = orders.history(po.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PoStatus::Pending);
    assert_eq!(history[0].actor_id, Some(seed.requestor.id));
}

#[test]
fn po_numbers_increase_and_are_never_reused() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();

    let first = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    let second = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(second.po_number, first.po_number + 1);

    orders.delete(seed.requestor.id, second.id).unwrap();
    assert_eq!(orders.peek_next_number().unwrap(), 3);

    let third = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(third.po_number, 3);
    assert_eq!(orders.get_by_number(3).unwrap().id, third.id);
}

#[test]
fn configured_start_number_is_respected() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let settings = SettingsService::from_connection(&conn).unwrap();

    let first = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(first.po_number, 1);

    settings
        .set_value(seed.admin.id, "po_number_start", "1000")
        .unwrap();
    let jumped = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(jumped.po_number, 1000);

    // Lowering the start never moves numbering backwards.
    settings
        .set_value(seed.admin.id, "po_number_start", "10")
        .unwrap();
    let next = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(next.po_number, 1001);
}

#[test]
fn unit_price_falls_back_to_supplier_history_then_zero() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let directory = DirectoryService::from_connection(&conn).unwrap();

    // The explicit 100.00 for paper is recorded as the supplier's latest price.
    orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    let history = directory
        .price_history(seed.paper.id, Some(seed.supplier.id))
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].unit_price, money("100.00"));

    directory
        .record_price(seed.admin.id, seed.paper.id, seed.supplier.id, money("95.75"))
        .unwrap();

    let mut request = simple_request(&seed);
    request.lines = vec![line(&seed.paper, 2, None)];
    request.discount = money("0");
    request.shipping = money("0");
    let po = orders.create(seed.requestor.id, &request).unwrap();
    assert_eq!(po.lines[0].unit_price, money("95.75"));
    assert_eq!(po.totals.subtotal, money("191.50"));
    // 12% of 191.50 = 22.98
    assert_eq!(po.totals.vat, money("22.98"));

    // No history at another supplier: price defaults to zero.
    let other = directory
        .create_supplier(
            seed.admin.id,
            &procure_core::model::directory::SupplierInput {
                name: "Other Vendor".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    let request = CreatePoRequest {
        supplier_id: other.id,
        lines: vec![line(&seed.paper, 5, None)],
        discount: money("0"),
        shipping: money("0"),
        ..simple_request(&seed)
    };
    let po = orders.create(seed.requestor.id, &request).unwrap();
    assert_eq!(po.lines[0].unit_price, money("0"));
    assert_eq!(po.totals.total, money("0"));
}

#[test]
fn repeated_explicit_price_is_not_duplicated_in_history() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let directory = DirectoryService::from_connection(&conn).unwrap();

    orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();

    let history = directory.price_history(seed.toner.id, None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].unit_price, money("25.50"));
}

#[test]
fn create_rejects_invalid_requests() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let directory = DirectoryService::from_connection(&conn).unwrap();

    let mut empty = simple_request(&seed);
    empty.lines.clear();
    let err = orders.create(seed.requestor.id, &empty).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyLines)
    ));

    let mut zero_quantity = simple_request(&seed);
    zero_quantity.lines[1].quantity = 0;
    let err = orders.create(seed.requestor.id, &zero_quantity).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::NonPositiveQuantity { line_no: 2 })
    ));

    let mut big_discount = simple_request(&seed);
    big_discount.discount = money("351.01");
    let err = orders.create(seed.requestor.id, &big_discount).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Pricing(PricingError::DiscountExceedsSubtotal { .. })
    ));

    let mut unknown_item = simple_request(&seed);
    unknown_item.lines[0].item_id = Uuid::new_v4();
    let err = orders.create(seed.requestor.id, &unknown_item).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "item", .. }));

    let mut blank_purpose = simple_request(&seed);
    blank_purpose.purpose = "   ".to_string();
    let err = orders.create(seed.requestor.id, &blank_purpose).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BlankField("purpose"))
    ));

    let mut for_someone_else = simple_request(&seed);
    for_someone_else.requestor_id = Some(seed.finance.id);
    let err = orders
        .create(seed.requestor.id, &for_someone_else)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden { .. }));

    directory
        .set_supplier_active(seed.admin.id, seed.supplier.id, false)
        .unwrap();
    let err = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap_err();
    assert!(matches!(err, ServiceError::InactiveSupplier(id) if id == seed.supplier.id));

    // Nothing above reached storage.
    assert!(orders.list(&PoListQuery::default()).unwrap().is_empty());
}

#[test]
fn superadmin_files_on_behalf_of_requestor() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();

    let mut request = simple_request(&seed);
    request.requestor_id = Some(seed.requestor.id);
    request.department_id = Some(seed.other_department.id);
    request.vat_rate = Some(Rate::from_bps(500).unwrap());
    let po = orders.create(seed.admin.id, &request).unwrap();

    assert_eq!(po.requestor_id, seed.requestor.id);
    assert_eq!(po.department_id, Some(seed.other_department.id));
    assert_eq!(po.totals.vat, money("15.00"));
    let history = orders.history(po.id).unwrap();
    assert_eq!(history[0].actor_id, Some(seed.admin.id));
}

#[test]
fn lines_are_editable_only_while_pending_by_owner() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let approvals = ApprovalService::from_connection(&conn).unwrap();

    let po = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    let update = UpdateLinesRequest {
        lines: vec![line(&seed.toner, 4, Some("30.00"))],
        vat_rate: None,
        shipping: money("10.00"),
        discount: money("0"),
    };

    let err = orders
        .update_lines(seed.finance.id, po.id, &update)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden { .. }));

    let updated = orders
        .update_lines(seed.requestor.id, po.id, &update)
        .unwrap();
    assert_eq!(updated.lines.len(), 1);
    assert_eq!(updated.lines[0].item_name, "Toner cartridge");
    assert_eq!(updated.totals.subtotal, money("120.00"));
    assert_eq!(updated.totals.vat, money("14.40"));
    assert_eq!(updated.totals.total, money("144.40"));
    assert_eq!(updated.po_number, po.po_number);

    approvals
        .apply(seed.finance.id, po.id, WorkflowAction::Verify, None)
        .unwrap();
    let err = orders
        .update_lines(seed.requestor.id, po.id, &update)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::StatusLocked {
            status: PoStatus::Verified,
            ..
        }
    ));
}

/// Lets a verifier move the PO on right before its lines are replaced,
/// after the service has already seen it at `Pending`.
struct VerifiedMidEdit<'conn> {
    inner: SqlitePurchaseOrderRepository<'conn>,
    verifier: UserId,
}

impl PurchaseOrderRepository for VerifiedMidEdit<'_> {
    fn next_po_number(&self, start: i64) -> RepoResult<i64> {
        self.inner.next_po_number(start)
    }

    fn insert_purchase_order(
        &self,
        po: &NewPurchaseOrder,
        po_number_start: i64,
        actor_id: UserId,
    ) -> RepoResult<PurchaseOrder> {
        self.inner
            .insert_purchase_order(po, po_number_start, actor_id)
    }

    fn replace_lines(
        &self,
        po_id: PoId,
        expected: PoStatus,
        vat_rate: Rate,
        totals: &PoTotals,
        lines: &[PricedLine],
    ) -> RepoResult<PurchaseOrder> {
        self.inner.record_transition(
            po_id,
            PoStatus::Pending,
            PoStatus::Verified,
            self.verifier,
            None,
        )?;
        self.inner
            .replace_lines(po_id, expected, vat_rate, totals, lines)
    }

    fn get_purchase_order(&self, po_id: PoId) -> RepoResult<Option<PurchaseOrder>> {
        self.inner.get_purchase_order(po_id)
    }

    fn get_by_number(&self, po_number: i64) -> RepoResult<Option<PurchaseOrder>> {
        self.inner.get_by_number(po_number)
    }

    fn list_purchase_orders(&self, query: &PoListQuery) -> RepoResult<Vec<PoSummary>> {
        self.inner.list_purchase_orders(query)
    }

    fn current_status(&self, po_id: PoId) -> RepoResult<Option<PoStatus>> {
        self.inner.current_status(po_id)
    }

    fn record_transition(
        &self,
        po_id: PoId,
        from: PoStatus,
        to: PoStatus,
        actor_id: UserId,
        remarks: Option<&str>,
    ) -> RepoResult<Approval> {
        self.inner
            .record_transition(po_id, from, to, actor_id, remarks)
    }

    fn approval_history(&self, po_id: PoId) -> RepoResult<Vec<Approval>> {
        self.inner.approval_history(po_id)
    }

    fn status_counts(&self) -> RepoResult<Vec<StatusCount>> {
        self.inner.status_counts()
    }

    fn soft_delete(&self, po_id: PoId) -> RepoResult<()> {
        self.inner.soft_delete(po_id)
    }

    fn list_statuses(&self) -> RepoResult<Vec<StatusDefinition>> {
        self.inner.list_statuses()
    }

    fn relabel_status(&self, status: PoStatus, label: &str) -> RepoResult<StatusDefinition> {
        self.inner.relabel_status(status, label)
    }
}

#[test]
fn failed_line_edit_leaves_price_history_untouched() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    let po = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    assert_eq!(
        catalog.latest_price(seed.paper.id, seed.supplier.id).unwrap(),
        Some(money("100.00"))
    );

    let racing = PurchaseOrderService::new(
        SqliteUserRepository::try_new(&conn).unwrap(),
        SqliteSupplierRepository::try_new(&conn).unwrap(),
        SqliteCatalogRepository::try_new(&conn).unwrap(),
        VerifiedMidEdit {
            inner: SqlitePurchaseOrderRepository::try_new(&conn).unwrap(),
            verifier: seed.finance.id,
        },
        SqliteSettingsRepository::try_new(&conn).unwrap(),
    );
    let update = UpdateLinesRequest {
        lines: vec![line(&seed.paper, 1, Some("999.00"))],
        vat_rate: None,
        shipping: money("0"),
        discount: money("0"),
    };
    let err = racing
        .update_lines(seed.requestor.id, po.id, &update)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repo(RepoError::StaleStatus {
            expected: PoStatus::Pending,
            actual: PoStatus::Verified,
            ..
        })
    ));

    assert_eq!(
        catalog.latest_price(seed.paper.id, seed.supplier.id).unwrap(),
        Some(money("100.00"))
    );
    assert_eq!(
        catalog
            .price_history(seed.paper.id, Some(seed.supplier.id))
            .unwrap()
            .len(),
        1
    );
    let reloaded = orders.get(po.id).unwrap();
    assert_eq!(reloaded.status, PoStatus::Verified);
    assert_eq!(reloaded.lines, po.lines);
}

#[test]
fn edited_explicit_price_is_recorded_with_the_new_lines() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    let po = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    let update = UpdateLinesRequest {
        lines: vec![line(&seed.paper, 1, Some("110.00"))],
        vat_rate: None,
        shipping: money("0"),
        discount: money("0"),
    };
    orders
        .update_lines(seed.requestor.id, po.id, &update)
        .unwrap();

    assert_eq!(
        catalog.latest_price(seed.paper.id, seed.supplier.id).unwrap(),
        Some(money("110.00"))
    );
}

#[test]
fn delete_is_limited_to_pending_or_rejected() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let approvals = ApprovalService::from_connection(&conn).unwrap();

    let verified = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    approvals
        .apply(seed.finance.id, verified.id, WorkflowAction::Verify, None)
        .unwrap();
    let err = orders.delete(seed.requestor.id, verified.id).unwrap_err();
    assert!(matches!(err, ServiceError::StatusLocked { .. }));

    let rejected = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    approvals
        .apply(
            seed.finance.id,
            rejected.id,
            WorkflowAction::Reject,
            Some("duplicate request"),
        )
        .unwrap();
    let err = orders.delete(seed.finance.id, rejected.id).unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden { .. }));
    orders.delete(seed.requestor.id, rejected.id).unwrap();

    let err = orders.get(rejected.id).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: "purchase order",
            ..
        }
    ));
    let err = orders.delete(seed.requestor.id, rejected.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[test]
fn list_filters_by_status_and_requestor() {
    let conn = setup();
    let seed = seed(&conn);
    let orders = PurchaseOrderService::from_connection(&conn).unwrap();
    let approvals = ApprovalService::from_connection(&conn).unwrap();

    let mine = orders
        .create(seed.requestor.id, &simple_request(&seed))
        .unwrap();
    let theirs = orders
        .create(seed.head.id, &simple_request(&seed))
        .unwrap();
    approvals
        .apply(seed.finance.id, theirs.id, WorkflowAction::Verify, None)
        .unwrap();

    let all = orders.list(&PoListQuery::default()).unwrap();
    assert_eq!(all.len(), 2);
    // Newest number first.
    assert_eq!(all[0].id, theirs.id);
    assert_eq!(all[0].supplier_name, "Acme Office Supply");
    assert_eq!(all[0].status, PoStatus::Verified);
    assert_eq!(all[0].display_number, "PO-000002");

    let pending = orders
        .list(&PoListQuery {
            status: Some(PoStatus::Pending),
            ..PoListQuery::default()
        })
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, mine.id);

    let by_requestor = orders
        .list(&PoListQuery {
            requestor_id: Some(seed.head.id),
            ..PoListQuery::default()
        })
        .unwrap();
    assert_eq!(by_requestor.len(), 1);
    assert_eq!(by_requestor[0].total, money("486.00"));

    let paged = orders
        .list(&PoListQuery {
            limit: Some(1),
            offset: 1,
            ..PoListQuery::default()
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, mine.id);
}
