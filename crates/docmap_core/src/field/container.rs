//! Optional values, sequences, sets and maps.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use docmap_codec::{Document, Value};

use crate::codec::EncodeContext;
use crate::error::{CoreError, CoreResult};
use crate::field::{EntityVisitor, FieldType, MapKey};
use crate::schema::Shape;

fn encode_all<'a, T, I>(items: I, ctx: &EncodeContext) -> CoreResult<Value>
where
    T: FieldType + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| item.to_value(ctx).map_err(|e| e.in_field(&i.to_string())))
        .collect::<CoreResult<Vec<_>>>()
        .map(Value::Array)
}

fn operands<'a, T, I>(items: I) -> CoreResult<Value>
where
    T: FieldType + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .map(|item| item.to_operand())
        .collect::<CoreResult<Vec<_>>>()
        .map(Value::Array)
}

fn decode_all<T: FieldType>(expected: &'static str, value: &Value) -> CoreResult<Vec<T>> {
    let items = value
        .as_array()
        .ok_or_else(|| CoreError::type_mismatch(expected, value))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| T::from_value(item).map_err(|e| e.in_field(&i.to_string())))
        .collect()
}

fn encode_map<'a, K, V, I>(entries: I, ctx: &EncodeContext) -> CoreResult<Value>
where
    K: MapKey + 'a,
    V: FieldType + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut doc = Document::new();
    for (key, value) in entries {
        let name = key.to_key();
        let encoded = value.to_value(ctx).map_err(|e| e.in_field(&name))?;
        doc.insert(name, encoded);
    }
    Ok(Value::Document(doc))
}

fn decode_map<K: MapKey, V: FieldType>(
    expected: &'static str,
    value: &Value,
) -> CoreResult<Vec<(K, V)>> {
    let doc = value
        .as_document()
        .ok_or_else(|| CoreError::type_mismatch(expected, value))?;
    doc.iter()
        .map(|(name, item)| {
            let key = K::from_key(name).map_err(|e| e.in_field(name))?;
            let value = V::from_value(item).map_err(|e| e.in_field(name))?;
            Ok((key, value))
        })
        .collect()
}

fn map_shape<K: MapKey, V: FieldType>() -> Shape {
    Shape::Map {
        key: Box::new(K::key_shape()),
        value: Box::new(V::shape()),
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        match self {
            Some(inner) => inner.to_value(ctx),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }

    fn is_null_value(&self) -> bool {
        self.as_ref().map_or(true, FieldType::is_null_value)
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        match self {
            Some(inner) => inner.visit_entities(visit),
            None => Ok(()),
        }
    }

    fn to_operand(&self) -> CoreResult<Value> {
        match self {
            Some(inner) => inner.to_operand(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn shape() -> Shape {
        Shape::List(Box::new(T::shape()))
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_all(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_all(std::any::type_name::<Self>(), value)
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        self.iter_mut().try_for_each(|item| item.visit_entities(visit))
    }

    fn to_operand(&self) -> CoreResult<Value> {
        operands(self)
    }
}

impl<T: FieldType> FieldType for Box<[T]> {
    fn shape() -> Shape {
        Shape::Array(Box::new(T::shape()))
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_all(self.iter(), ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_all(std::any::type_name::<Self>(), value).map(Vec::into_boxed_slice)
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        self.iter_mut().try_for_each(|item| item.visit_entities(visit))
    }

    fn to_operand(&self) -> CoreResult<Value> {
        operands(self.iter())
    }
}

impl<T: FieldType + Eq + Hash> FieldType for HashSet<T> {
    fn shape() -> Shape {
        Shape::Set(Box::new(T::shape()))
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_all(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_all(std::any::type_name::<Self>(), value).map(|items| items.into_iter().collect())
    }

    // Members may change while visited, so they are rehashed afterwards.
    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        let mut items: Vec<T> = self.drain().collect();
        let result = items
            .iter_mut()
            .try_for_each(|item| item.visit_entities(visit));
        self.extend(items);
        result
    }

    fn to_operand(&self) -> CoreResult<Value> {
        operands(self)
    }
}

impl<T: FieldType + Ord> FieldType for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::Set(Box::new(T::shape()))
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_all(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_all(std::any::type_name::<Self>(), value).map(|items| items.into_iter().collect())
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        let mut items: Vec<T> = std::mem::take(self).into_iter().collect();
        let result = items
            .iter_mut()
            .try_for_each(|item| item.visit_entities(visit));
        self.extend(items);
        result
    }

    fn to_operand(&self) -> CoreResult<Value> {
        operands(self)
    }
}

impl<K: MapKey + Eq + Hash, V: FieldType> FieldType for HashMap<K, V> {
    fn shape() -> Shape {
        map_shape::<K, V>()
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_map(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_map(std::any::type_name::<Self>(), value).map(|entries| entries.into_iter().collect())
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        if !K::CASCADES {
            return Ok(());
        }
        self.values_mut()
            .try_for_each(|value| value.visit_entities(visit))
    }
}

impl<K: MapKey + Ord, V: FieldType> FieldType for BTreeMap<K, V> {
    fn shape() -> Shape {
        map_shape::<K, V>()
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_map(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        decode_map(std::any::type_name::<Self>(), value).map(|entries| entries.into_iter().collect())
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        if !K::CASCADES {
            return Ok(());
        }
        self.values_mut()
            .try_for_each(|value| value.visit_entities(visit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AnyEntity;
    use crate::test_support::{Part, Shade};

    fn count_entities<T: FieldType>(value: &mut T) -> usize {
        let mut count = 0;
        value
            .visit_entities(&mut |_: &mut dyn AnyEntity| {
                count += 1;
                Ok(())
            })
            .unwrap();
        count
    }

    #[test]
    fn option_is_nullable_and_transparent() {
        assert!(Option::<i32>::nullable());
        assert_eq!(Option::<i32>::shape(), i32::shape());
        assert_eq!(
            Some(3_i32).to_value(&EncodeContext::identity()).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn element_errors_carry_their_index() {
        let value = Value::Array(vec![Value::Integer(1), Value::from("two")]);
        let err = Vec::<i32>::from_value(&value).unwrap_err();
        assert!(matches!(err, CoreError::Field { ref field, .. } if field == "1"));
    }

    #[test]
    fn enum_keyed_maps_use_variant_names() {
        let mut map = BTreeMap::new();
        map.insert(Shade::Dark, 1_i32);
        let value = map.to_value(&EncodeContext::identity()).unwrap();
        assert_eq!(value.get("Dark"), Some(&Value::Integer(1)));
        assert_eq!(BTreeMap::<Shade, i32>::from_value(&value).unwrap(), map);
    }

    #[test]
    fn only_string_keyed_maps_are_visited() {
        let mut by_name = HashMap::new();
        by_name.insert("a".to_string(), Part::new("a", 1));
        assert_eq!(count_entities(&mut by_name), 1);

        let mut by_shade = BTreeMap::new();
        by_shade.insert(Shade::Dark, Part::new("d", 1));
        assert_eq!(count_entities(&mut by_shade), 0);
    }

    #[test]
    fn nested_containers_reach_every_entity() {
        let mut nested = vec![vec![Part::new("a", 1)], vec![Part::new("b", 2), Part::new("c", 3)]];
        assert_eq!(count_entities(&mut nested), 3);

        let mut boxed: Box<[Option<Part>]> = vec![None, Some(Part::new("x", 1))].into_boxed_slice();
        assert_eq!(count_entities(&mut boxed), 1);
        assert!(matches!(<Box<[Option<Part>]>>::shape(), Shape::Array(_)));
    }

    #[test]
    fn set_members_survive_visiting() {
        let mut set: BTreeSet<i32> = [3, 1, 2].into_iter().collect();
        assert_eq!(count_entities(&mut set), 0);
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.to_value(&EncodeContext::identity()).unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }
}
