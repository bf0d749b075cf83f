//! Integration tests for edge-dhcp-sync
//!
//! Full reconciliation passes against an in-memory gateway that records
//! every call made to it.

use edge_dhcp_sync::config::DEFAULT_INTERFACE_SLOTS;
use edge_dhcp_sync::gateway::{ApiResult, GatewayApi};
use edge_dhcp_sync::models::{
    DhcpServiceSpec, GatewayDescriptor, IpRange, LogicalNetworkSpec, ProvisionedPool, SubnetSpec,
};
use edge_dhcp_sync::processing::{GatewayConfigSync, SlotAllocator};
use edge_dhcp_sync::{Error, ExternalServiceError};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    FetchGateway,
    FetchPools,
    WriteGateway,
    AddPool(String),
    DeletePool(String),
}

struct FakeGateway {
    gateway: GatewayDescriptor,
    pools: Vec<ProvisionedPool>,
    calls: Vec<Call>,
    next_pool: usize,
    /// Pool adds that succeed before every further add fails.
    adds_before_failure: Option<usize>,
}

impl FakeGateway {
    fn new() -> FakeGateway {
        FakeGateway {
            gateway: GatewayDescriptor::new("edge-1", DEFAULT_INTERFACE_SLOTS),
            pools: vec![],
            calls: vec![],
            next_pool: 0,
            adds_before_failure: None,
        }
    }
}

impl GatewayApi for FakeGateway {
    fn fetch_gateway(&mut self, gateway_id: &str) -> ApiResult<GatewayDescriptor> {
        self.calls.push(Call::FetchGateway);
        if gateway_id != self.gateway.id {
            return Err(ExternalServiceError::NotFound {
                operation: "fetch gateway".to_string(),
                detail: gateway_id.to_string(),
            });
        }
        Ok(self.gateway.clone())
    }

    fn write_gateway(&mut self, gateway: &GatewayDescriptor) -> ApiResult<()> {
        self.calls.push(Call::WriteGateway);
        self.gateway = gateway.clone();
        self.gateway.pools.clear();
        Ok(())
    }

    fn add_pool_entry(
        &mut self,
        _gateway_id: &str,
        range: &IpRange,
        default_gateway: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> ApiResult<String> {
        self.calls.push(Call::AddPool(range.to_string()));
        if let Some(left) = self.adds_before_failure.as_mut() {
            if *left == 0 {
                return Err(ExternalServiceError::Unavailable {
                    operation: "add pool entry".to_string(),
                    detail: "HTTP 503: busy".to_string(),
                });
            }
            *left -= 1;
        }
        self.next_pool += 1;
        let pool_id = format!("pool-{}", self.next_pool);
        self.pools.push(ProvisionedPool {
            pool_id: pool_id.clone(),
            ip_range: *range,
            default_gateway: Some(default_gateway),
            subnet_mask: Some(netmask),
        });
        Ok(pool_id)
    }

    fn delete_pool_entry(&mut self, _gateway_id: &str, pool_id: &str) -> ApiResult<()> {
        self.calls.push(Call::DeletePool(pool_id.to_string()));
        let before = self.pools.len();
        self.pools.retain(|p| p.pool_id != pool_id);
        if self.pools.len() == before {
            return Err(ExternalServiceError::NotFound {
                operation: "delete pool entry".to_string(),
                detail: pool_id.to_string(),
            });
        }
        Ok(())
    }

    fn fetch_provisioned_pools(&mut self, _gateway_id: &str) -> ApiResult<Vec<ProvisionedPool>> {
        self.calls.push(Call::FetchPools);
        Ok(self.pools.clone())
    }
}

fn sync_with(fake: FakeGateway) -> GatewayConfigSync<FakeGateway> {
    GatewayConfigSync::new(fake, SlotAllocator::new(DEFAULT_INTERFACE_SLOTS))
}

/// Two logical networks: one fully derived subnet, one with explicit gateway and pool.
fn desired() -> DhcpServiceSpec {
    DhcpServiceSpec {
        gateway_id: "edge-1".to_string(),
        logical_networks: vec![
            LogicalNetworkSpec {
                id: "ls-a".to_string(),
                subnets: vec![SubnetSpec::new("1.2.3.0/24")],
            },
            LogicalNetworkSpec {
                id: "ls-b".to_string(),
                subnets: vec![SubnetSpec::new("4.3.2.0/24")
                    .with_gateway("4.3.2.1")
                    .with_pool(&["4.3.2.10-4.3.2.20"])],
            },
        ],
    }
}

fn add(range: &str) -> Call {
    Call::AddPool(range.to_string())
}

fn delete(pool_id: &str) -> Call {
    Call::DeletePool(pool_id.to_string())
}

fn created() -> GatewayConfigSync<FakeGateway> {
    let mut sync = sync_with(FakeGateway::new());
    sync.create(&desired()).expect("create failed");
    sync
}

#[test]
fn test_create_writes_slots_before_pools() {
    let sync = created();
    let fake = sync.api();
    assert_eq!(
        fake.calls,
        vec![
            Call::FetchGateway,
            Call::FetchPools,
            Call::WriteGateway,
            add("1.2.3.3-1.2.3.254"),
            add("4.3.2.11-4.3.2.20"),
        ]
    );
    assert!(fake.gateway.appliances_deployed);
    let a = fake.gateway.slot_for("ls-a").expect("ls-a not attached");
    let b = fake.gateway.slot_for("ls-b").expect("ls-b not attached");
    assert_eq!((a.index, b.index), (0, 1));
    assert_eq!(a.address_groups[0].primary_address.to_string(), "1.2.3.2");
    assert_eq!(b.address_groups[0].primary_address.to_string(), "4.3.2.10");
    assert_eq!(fake.pools[1].default_gateway.map(|g| g.to_string()), Some("4.3.2.1".to_string()));
}

#[test]
fn test_unchanged_configuration_makes_no_calls() {
    let mut sync = created();
    let before = sync.api().calls.len();
    let report = sync.update(&desired(), &desired()).unwrap();
    assert_eq!(report.external_changes(), 0);
    assert_eq!(sync.api().calls.len(), before);
}

#[test]
fn test_validation_error_makes_no_calls() {
    let mut sync = sync_with(FakeGateway::new());
    let mut bad = desired();
    bad.logical_networks[0].subnets[0] = SubnetSpec::new("1.2.3.0/24").with_pool(&["1.2.3.50-1.2.3.5"]);
    let err = sync.create(&bad).unwrap_err();
    assert!(matches!(err, Error::RangeInverted { .. }));
    assert!(err.is_validation());
    assert!(sync.api().calls.is_empty());
}

#[test]
fn test_nested_subnet_on_other_network_makes_no_calls() {
    let mut sync = sync_with(FakeGateway::new());
    let mut bad = desired();
    bad.logical_networks.push(LogicalNetworkSpec {
        id: "ls-c".to_string(),
        subnets: vec![SubnetSpec::new("1.2.0.0/16")],
    });
    let err = sync.create(&bad).unwrap_err();
    assert!(matches!(err, Error::OverlappingRanges { .. }));
    assert!(sync.api().calls.is_empty());
}

#[test]
fn test_range_repeated_in_one_plan_is_added_once() {
    let mut sync = sync_with(FakeGateway::new());
    let mut plan = sync.plan(&desired().empty_for(), &desired()).unwrap();
    let repeat = plan.pool_adds[0].clone();
    plan.pool_adds.push(repeat.clone());
    let report = sync.apply("edge-1", &plan).unwrap();
    assert_eq!(report.pools_added.len(), 2);
    assert_eq!(report.pools_present, vec![repeat.range]);
    assert_eq!(sync.api().pools.len(), 2);
}

#[test]
fn test_delete_removes_pools_before_slots() {
    let mut sync = created();
    sync.delete(&desired()).unwrap();
    let fake = sync.into_api();
    assert_eq!(
        fake.calls[5..].to_vec(),
        vec![
            Call::FetchGateway,
            Call::FetchPools,
            delete("pool-1"),
            delete("pool-2"),
            Call::WriteGateway,
        ]
    );
    assert!(fake.pools.is_empty());
    assert!(!fake.gateway.any_connected());
    assert!(!fake.gateway.appliances_deployed);
}

#[test]
fn test_pool_change_leaves_slots_alone() {
    let mut sync = created();
    let mut wider = desired();
    wider.logical_networks[1].subnets[0] = SubnetSpec::new("4.3.2.0/24")
        .with_gateway("4.3.2.1")
        .with_pool(&["4.3.2.10-4.3.2.30"]);
    let report = sync.update(&desired(), &wider).unwrap();
    assert!(!report.gateway_written);
    assert_eq!(
        sync.api().calls[5..].to_vec(),
        vec![
            Call::FetchGateway,
            Call::FetchPools,
            delete("pool-2"),
            add("4.3.2.11-4.3.2.30"),
        ]
    );
}

#[test]
fn test_interface_change_rewrites_address_group() {
    let mut sync = created();
    let mut moved = desired();
    moved.logical_networks[0].subnets[0] = SubnetSpec::new("1.2.3.0/24").with_pool(&["1.2.3.10-1.2.3.90"]);
    let report = sync.update(&desired(), &moved).unwrap();
    assert!(report.gateway_written);
    let fake = sync.api();
    assert_eq!(
        fake.calls[5..].to_vec(),
        vec![
            Call::FetchGateway,
            Call::FetchPools,
            delete("pool-1"),
            Call::WriteGateway,
            add("1.2.3.12-1.2.3.90"),
        ]
    );
    let slot = fake.gateway.slot_for("ls-a").unwrap();
    assert_eq!(slot.index, 0);
    assert_eq!(slot.address_groups.len(), 1);
    assert_eq!(slot.address_groups[0].primary_address.to_string(), "1.2.3.11");
    assert!(fake.gateway.appliances_deployed);
}

#[test]
fn test_slot_exhaustion_fails_before_any_write() {
    let mut fake = FakeGateway::new();
    for slot in fake.gateway.slots.iter_mut() {
        slot.logical_network_id = Some(format!("other-{}", slot.index));
        slot.is_connected = true;
    }
    let before = fake.gateway.clone();
    let mut sync = sync_with(fake);
    let err = sync.create(&desired()).unwrap_err();
    assert!(matches!(err, Error::NoFreeInterfaceSlot { capacity: 10, .. }));
    let fake = sync.into_api();
    assert_eq!(fake.calls, vec![Call::FetchGateway, Call::FetchPools]);
    assert_eq!(fake.gateway, before);
}

#[test]
fn test_failure_is_not_rolled_back() {
    let mut fake = FakeGateway::new();
    fake.adds_before_failure = Some(1);
    let mut sync = sync_with(fake);
    let err = sync.create(&desired()).unwrap_err();
    assert!(matches!(
        err,
        Error::External(ExternalServiceError::Unavailable { .. })
    ));
    let mut fake = sync.into_api();
    // slots written and the first pool stay in place
    assert!(fake.gateway.slot_for("ls-a").is_some());
    assert_eq!(fake.pools.len(), 1);

    // the next pass picks up from what is provisioned
    fake.adds_before_failure = None;
    fake.calls.clear();
    let mut sync = sync_with(fake);
    let report = sync.create(&desired()).unwrap();
    assert!(!report.gateway_written);
    assert_eq!(report.pools_present.len(), 1);
    assert_eq!(
        sync.api().calls,
        vec![Call::FetchGateway, Call::FetchPools, add("4.3.2.11-4.3.2.20")]
    );
}

#[test]
fn test_absent_pool_delete_is_skipped() {
    let sync = created();
    let mut fake = sync.into_api();
    fake.pools.retain(|p| p.pool_id != "pool-2");
    let mut sync = sync_with(fake);
    let report = sync.delete(&desired()).unwrap();
    assert_eq!(report.pools_deleted, vec!["pool-1".to_string()]);
    assert_eq!(
        report.pools_skipped.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        vec!["4.3.2.11-4.3.2.20"]
    );
    assert!(!sync.api().gateway.any_connected());
}

#[test]
fn test_read_groups_pools_by_slot() {
    let sync = created();
    let mut fake = sync.into_api();
    fake.pools.push(ProvisionedPool {
        pool_id: "stray".to_string(),
        ip_range: "9.9.9.1-9.9.9.5".parse().unwrap(),
        default_gateway: None,
        subnet_mask: None,
    });
    let mut sync = sync_with(fake);
    let observed = sync.read("edge-1").unwrap();
    assert!(observed.appliances_deployed);
    assert_eq!(observed.slots.len(), 2);
    assert_eq!(observed.slots[0].logical_network_id.as_deref(), Some("ls-a"));
    assert_eq!(observed.slots[0].pools[0].pool_id, "pool-1");
    assert_eq!(observed.slots[1].pools[0].pool_id, "pool-2");
    assert_eq!(observed.unowned_pools.len(), 1);
    assert_eq!(observed.unowned_pools[0].pool_id, "stray");
}

#[test]
fn test_unknown_gateway_surfaces_not_found() {
    let mut sync = sync_with(FakeGateway::new());
    let err = sync.read("edge-404").unwrap_err();
    assert!(matches!(
        err,
        Error::External(ExternalServiceError::NotFound { .. })
    ));
}
