//! 服务组装

use std::sync::Arc;

use bastion_config::AppConfig;
use bastion_ports::SettingsPort;

use crate::application::catalog::CatalogService;
use crate::application::guard::AccessGuard;
use crate::application::lockout::LockoutGuard;
use crate::application::login::LoginService;
use crate::application::principal::PrincipalService;
use crate::application::seed::CatalogSeeder;
use crate::domain::credential::CredentialHasher;
use crate::domain::lockout::LockoutStore;
use crate::domain::unit_of_work::UnitOfWorkFactory;

/// 请求处理层使用的全部服务
pub struct AdminAccess {
    pub catalog: CatalogService,
    pub principals: PrincipalService,
    pub guard: AccessGuard,
    pub lockout: Arc<LockoutGuard>,
    pub login: LoginService,
    pub seeder: CatalogSeeder,
}

impl AdminAccess {
    pub fn new(
        config: &AppConfig,
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        settings: Arc<dyn SettingsPort>,
        lockout_store: Arc<dyn LockoutStore>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let lockout = Arc::new(LockoutGuard::new(
            lockout_store,
            settings,
            config.lockout.clone(),
        ));

        Self {
            catalog: CatalogService::new(uow_factory.clone()),
            principals: PrincipalService::new(uow_factory.clone(), hasher.clone()),
            guard: AccessGuard::new(uow_factory.clone(), config.guard.clone()),
            login: LoginService::new(
                uow_factory.clone(),
                hasher,
                lockout.clone(),
                config.guard.clone(),
            ),
            lockout,
            seeder: CatalogSeeder::new(uow_factory),
        }
    }
}
